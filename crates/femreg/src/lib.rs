#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use femreg_linalg as linalg;

#[doc(inline)]
pub use femreg_mesh as mesh;

#[doc(inline)]
pub use femreg_robust as robust;
