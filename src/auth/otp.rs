//! One-time numeric codes

use rand::{rngs::OsRng, Rng};

pub const OTP_MIN: u32 = 100_000;
pub const OTP_MAX: u32 = 999_999;

pub trait OtpGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform 6-digit codes from the OS random source
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomOtp;

impl OtpGenerator for RandomOtp {
    fn generate(&self) -> String {
        OsRng.gen_range(OTP_MIN..=OTP_MAX).to_string()
    }
}
