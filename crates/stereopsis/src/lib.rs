#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use stereopsis_tensor as tensor;

#[doc(inline)]
pub use stereopsis_image as image;

#[doc(inline)]
pub use stereopsis_imgproc as imgproc;

#[doc(inline)]
pub use stereopsis_pipeline as pipeline;
