pub mod types;
pub mod buf;
pub mod desc;
pub mod value;
pub mod codec;

pub use types::Result;
pub use types::Error;

pub use buf::Buf;
pub use buf::Mark;

pub use desc::TypeDesc;
pub use value::Value;

pub use codec::ObjectCodec;
pub use codec::CompositeCodec;
