//! Unit conversions used when rendering metric provider data in US units.
//!
//! All conversions are pure; callers only apply them to values that are present.

const MPS_TO_MPH: f64 = 2.23694;
const PA_TO_INHG: f64 = 0.0002953;
const HPA_TO_INHG: f64 = 0.02953;
const MM_TO_IN: f64 = 0.03937;

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn mps_to_mph(mps: f64) -> f64 {
    mps * MPS_TO_MPH
}

/// Pascals, as reported by api.weather.gov.
pub fn pa_to_inhg(pa: f64) -> f64 {
    pa * PA_TO_INHG
}

/// Hectopascals (millibars), as reported by Tempest stations.
pub fn hpa_to_inhg(hpa: f64) -> f64 {
    hpa * HPA_TO_INHG
}

pub fn mm_to_inches(mm: f64) -> f64 {
    mm * MM_TO_IN
}

/// Estimated output of a solar panel in watts.
///
/// * `area_m2` - panel area in square meters
/// * `efficiency` - panel efficiency as a fraction (0.20 for 20%)
/// * `irradiance` - solar radiation in W/m²
pub fn panel_power_watts(area_m2: f64, efficiency: f64, irradiance: f64) -> f64 {
    area_m2 * efficiency * irradiance
}
