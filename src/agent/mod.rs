//! The reconciliation agent: delta handling, reporting, and the transport
//! seams to the cloud messaging collaborator.

mod handler;
mod reporter;
mod transport;
mod worker;

pub use handler::{DeltaHandler, PassState, PassSummary};
pub use reporter::{ReportedContainer, StateReport, StateReporter};
pub use transport::{
    DeltaFeed, DeltaFilePoller, DeltaReceiver, FileReportSink, LogReportSink, ReportSink,
};
pub use worker::AgentWorker;
