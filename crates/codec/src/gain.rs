//! Digital gain conversion.
//!
//! Gains are requested in whole decibels and programmed as fixed-point
//! amplitude coefficients: s6.14 on the DAC path, s8.12 on the ADC path,
//! both saturated to the 20-bit coefficient field. -99 dB is the mute
//! sentinel and maps to an exact zero coefficient; 0 dB maps to exact unity
//! (no rounding residue, so a unity path is bit-transparent).

use platform::GainDb;

/// DAC coefficient fractional bits (s6.14).
pub const DAC_FRACTION_BITS: u32 = 14;

/// ADC coefficient fractional bits (s8.12).
pub const ADC_FRACTION_BITS: u32 = 12;

/// Signed saturation bound for the 20-bit coefficient field.
const COEFF_MAX: i32 = (1 << 19) - 1;
const COEFF_MIN: i32 = -(1 << 19);

/// 10^(dB/20) for dB in -98..=50; -99 and below are handled as exact mute.
/// Generated once from the closed form; kept as a table so the no_std build
/// needs no floating-point power function and every build computes
/// identical coefficients.
#[rustfmt::skip]
const AMPLITUDE_RATIO: [f32; 149] = [
    1.258925e-05, 1.412538e-05, 1.584893e-05, 1.778279e-05, 1.995262e-05,
    2.238721e-05, 2.511886e-05, 2.818383e-05, 3.162278e-05, 3.548134e-05,
    3.981072e-05, 4.466836e-05, 5.011872e-05, 5.623413e-05, 6.309573e-05,
    7.079458e-05, 7.943282e-05, 8.912509e-05, 0.0001, 0.0001122018,
    0.0001258925, 0.0001412538, 0.0001584893, 0.0001778279, 0.0001995262,
    0.0002238721, 0.0002511886, 0.0002818383, 0.0003162278, 0.0003548134,
    0.0003981072, 0.0004466836, 0.0005011872, 0.0005623413, 0.0006309573,
    0.0007079458, 0.0007943282, 0.0008912509, 0.001, 0.001122018,
    0.001258925, 0.001412538, 0.001584893, 0.001778279, 0.001995262,
    0.002238721, 0.002511886, 0.002818383, 0.003162278, 0.003548134,
    0.003981072, 0.004466836, 0.005011872, 0.005623413, 0.006309573,
    0.007079458, 0.007943282, 0.008912509, 0.01, 0.01122018,
    0.01258925, 0.01412538, 0.01584893, 0.01778279, 0.01995262,
    0.02238721, 0.02511886, 0.02818383, 0.03162278, 0.03548134,
    0.03981072, 0.04466836, 0.05011872, 0.05623413, 0.06309573,
    0.07079458, 0.07943282, 0.08912509, 0.1, 0.1122018,
    0.1258925, 0.1412538, 0.1584893, 0.1778279, 0.1995262,
    0.2238721, 0.2511886, 0.2818383, 0.3162278, 0.3548134,
    0.3981072, 0.4466836, 0.5011872, 0.5623413, 0.6309573,
    0.7079458, 0.7943282, 0.8912509, 1.0, 1.122018,
    1.258925, 1.412538, 1.584893, 1.778279, 1.995262,
    2.238721, 2.511886, 2.818383, 3.162278, 3.548134,
    3.981072, 4.466836, 5.011872, 5.623413, 6.309573,
    7.079458, 7.943282, 8.912509, 10.0, 11.22018,
    12.58925, 14.12538, 15.84893, 17.78279, 19.95262,
    22.38721, 25.11886, 28.18383, 31.62278, 35.48134,
    39.81072, 44.66836, 50.11872, 56.23413, 63.09573,
    70.79458, 79.43282, 89.12509, 100.0, 112.2018,
    125.8925, 141.2538, 158.4893, 177.8279, 199.5262,
    223.8721, 251.1886, 281.8383, 316.2278,
];

/// Linear amplitude ratio for a dB gain.
#[must_use]
pub fn db_to_amplitude_ratio(gain: GainDb) -> f32 {
    let db = gain.get();
    if db <= GainDb::MIN_DB {
        return 0.0;
    }
    if db == 0 {
        return 1.0;
    }
    // db - MIN_DB does not fit in i8 at the top of the range
    #[allow(clippy::arithmetic_side_effects, clippy::cast_sign_loss)]
    let idx = (i32::from(db) - i32::from(GainDb::MIN_DB) - 1) as usize;
    AMPLITUDE_RATIO.get(idx).copied().unwrap_or(0.0)
}

/// Saturate a raw coefficient into the signed 20-bit field encoding.
#[must_use]
pub fn ssat20(value: i32) -> u32 {
    let clamped = value.clamp(COEFF_MIN, COEFF_MAX);
    #[allow(clippy::cast_sign_loss)] // two's-complement field encoding
    {
        (clamped as u32) & 0xF_FFFF
    }
}

/// DAC gain coefficient in s6.14, saturated to 20 bits.
///
/// `attenuation` scales the amplitude before fixing; it carries the
/// DC-calibration trim and is 1.0 when calibration is off.
#[must_use]
pub fn dac_coefficient(gain: GainDb, attenuation: f32) -> u32 {
    let ratio = db_to_amplitude_ratio(gain) * attenuation;
    #[allow(clippy::cast_possible_truncation)] // `as` saturates f32 -> i32
    {
        ssat20((ratio * (1 << DAC_FRACTION_BITS) as f32) as i32)
    }
}

/// ADC gain coefficient in s8.12, saturated to 20 bits.
#[must_use]
pub fn adc_coefficient(gain: GainDb) -> u32 {
    let ratio = db_to_amplitude_ratio(gain);
    #[allow(clippy::cast_possible_truncation)] // `as` saturates f32 -> i32
    {
        ssat20((ratio * (1 << ADC_FRACTION_BITS) as f32) as i32)
    }
}
