//! Component lifecycle trait, adapted from the teacher's
//! `infra_common::lifecycle::component` module.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::InfraError;

/// Possible states of a long-lived component (registrar, session store,
/// MWI manager, certificate manager, server shell, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Created,
    Running,
    Stopped,
}

/// Standard start/stop lifecycle implemented by every long-lived manager
/// in the workspace, so the server shell can bring every collaborator up
/// and tear it down uniformly.
#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> ComponentState;

    /// Start any background tasks owned by this component. Idempotent:
    /// calling `start` on an already-running component is a no-op.
    async fn start(&self) -> Result<(), InfraError>;

    /// Stop background tasks and release owned resources. Idempotent.
    async fn stop(&self) -> Result<(), InfraError>;
}
