pub mod fingerprint;
pub mod message;
