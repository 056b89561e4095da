//! Conformance tracking.
//!
//! Scores for a fixed set of known files are tracked from version to
//! version so that published results stay comparable. Any algorithm or
//! parameter change that moves one of these scores must bump
//! [`CONFORMANCE_VERSION`]. The first digit is the major version, the last
//! two digits the minor version.

pub const CONFORMANCE_VERSION: u32 = 300;

/// Clean speech clip CA01_01 against its transcoded copy, speech mode.
pub const SPEECH_CA01_TRANSCODED: f64 = 2.472834;

/// Strauss excerpt against a 3.5 kHz low-pass of itself, audio mode.
pub const STRAUSS_LP35: f64 = 1.9905729378864558;

/// Castanets clip compared against itself, audio mode.
pub const CASTANETS_IDENTITY: f64 = 4.7321012530423481;

/// Guitar clip against a short degraded patch of itself, audio mode.
pub const GUITAR_SHORT_DEGRADED_PATCH: f64 = 4.0120925346530543;

/// Short guitar reference patch against the full degraded clip, audio mode.
pub const GUITAR_SHORT_REFERENCE_PATCH: f64 = 4.9771152297354284;

/// Two unrelated clips must floor to MOS 1.
pub const DIFFERENT_AUDIOS: f64 = 1.0;

/// Tolerance used when comparing against the scores above.
pub const TOLERANCE: f64 = 0.0001;
