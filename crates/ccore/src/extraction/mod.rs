//! Format-specific extraction logic, consumed by the engines in
//! [`crate::engines`].

#[cfg(feature = "html")]
pub mod html;

#[cfg(feature = "pdf")]
pub mod pdf;

#[cfg(feature = "office")]
pub mod office;

#[cfg(feature = "audio")]
pub mod media;
