//! Telemetry delivery.
//!
//! - [`TimelineRecord`] - Partial record updates and their merge rule
//! - [`TelemetryClient`] - The remote service boundary
//! - [`DeliveryQueue`] - Batching producer/consumer pipeline with an orderly drain
//! - [`LocalTelemetryClient`] - Writes telemetry to a directory
//! - [`MockTelemetryClient`] - Records calls for tests

pub mod client;
mod console;
pub mod local;
pub mod mock;
pub mod queue;
pub mod record;
mod timeline;
pub mod upload;

pub use client::{Content, LogDescriptor, TelemetryClient, Timeline};
pub use local::LocalTelemetryClient;
pub use mock::{MockAttachment, MockTelemetryClient};
pub use queue::{DeliveryHandle, DeliveryQueue, JobTarget};
pub use record::{
    merge_records, Issue, IssueType, LogReference, TimelineRecord, TimelineRecordState,
    TimelineReference,
};
pub use upload::{AttachmentType, UploadItem};
