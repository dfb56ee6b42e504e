// cf-core/src/units.rs

use uom::si::f64::{
    ElectricCurrent as UomElectricCurrent, ElectricPotential as UomElectricPotential,
    ElectricalConductivity as UomElectricalConductivity, Length as UomLength,
    MolarConcentration as UomMolarConcentration, Ratio as UomRatio,
    ThermodynamicTemperature as UomThermodynamicTemperature, Time as UomTime,
};

// Public canonical unit types (SI, f64)
pub type Current = UomElectricCurrent;
pub type Potential = UomElectricPotential;
pub type Conductivity = UomElectricalConductivity;
pub type Length = UomLength;
pub type Concentration = UomMolarConcentration;
pub type Ratio = UomRatio;
pub type Temperature = UomThermodynamicTemperature;
pub type Time = UomTime;

#[inline]
pub fn amp(v: f64) -> Current {
    use uom::si::electric_current::ampere;
    Current::new::<ampere>(v)
}

#[inline]
pub fn volt(v: f64) -> Potential {
    use uom::si::electric_potential::volt;
    Potential::new::<volt>(v)
}

#[inline]
pub fn s_per_m(v: f64) -> Conductivity {
    use uom::si::electrical_conductivity::siemens_per_meter;
    Conductivity::new::<siemens_per_meter>(v)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

#[inline]
pub fn mol_m3(v: f64) -> Concentration {
    use uom::si::molar_concentration::mole_per_cubic_meter;
    Concentration::new::<mole_per_cubic_meter>(v)
}

#[inline]
pub fn unitless(v: f64) -> Ratio {
    use uom::si::ratio::ratio;
    Ratio::new::<ratio>(v)
}

pub mod constants {
    /// Faraday constant [C/mol]
    pub const FARADAY_C_PER_MOL: f64 = 96_485.332_12;

    /// Universal gas constant [J/(mol K)]
    pub const GAS_CONSTANT_J_PER_MOL_K: f64 = 8.314_462_618;

    /// Reference temperature for material data [K]
    pub const T_REF_K: f64 = 298.15;

    /// RT/F at the given temperature [V]
    #[inline]
    pub fn thermal_voltage(t_k: f64) -> f64 {
        GAS_CONSTANT_J_PER_MOL_K * t_k / FARADAY_C_PER_MOL
    }
}
