mod cancellation;
mod model;
mod registry;

pub use cancellation::CancellationToken;
pub use model::{OperationKind, OperationRecord, OperationStatus};
pub use registry::{OperationHandle, OperationRegistry};
