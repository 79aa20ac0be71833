pub mod notify;
pub mod options;
pub mod output;
pub mod report;
