//! Native `wuffs_imageio` hosting: platform resolution, packaged binaries, loading and the
//! typed call surface.

pub mod abi;
pub mod ffi;
pub mod loader;
pub mod platform;
pub mod resources;

pub use ffi::{bridge, NativeApi};
pub use loader::{LoadedNative, NativeLibrary, NativeVariant};
pub use platform::PlatformDescriptor;
pub use resources::cleanup_extracted;
