pub mod designer;
pub mod host_bins;
pub mod kits;
pub mod probe;
pub mod scanner;
pub mod toolchain;
