pub mod request;
pub mod response;
pub mod stream;

pub use request::Request;
pub use response::Response;
pub use stream::BodyStream;
