pub mod codec;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod hessian;
pub mod value;

pub use codec::*;
pub use descriptor::*;
pub use error::*;
pub use frame::*;
pub use hessian::*;
pub use value::*;
