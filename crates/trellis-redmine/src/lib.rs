pub mod client;
pub mod metadata;
pub mod models;

pub use client::{IssueFilter, RedmineClient};
pub use metadata::MetadataCache;
pub use models::{
    Issue, IssueDraft, IssueUpdate, NamedRef, Priority, Project, Status, TimeEntry, Tracker, User,
};
