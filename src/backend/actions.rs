//! Pointer action registry.
//!
//! Maps the workflow-facing action names onto a pointer-injection driver.
//! The driver itself (OS message injection, uinput, ...) is a collaborator
//! behind [`PointerDriver`]; this module owns only name dispatch and the
//! fine-offset arithmetic.

use async_trait::async_trait;

use crate::backend::ActionBackend;
use crate::domain::Position;
use crate::error::{Result, TapdanceError};

/// Action names every pointer backend understands.
pub const POINTER_ACTIONS: [&str; 4] = ["click", "double_click", "right_click", "move"];

/// Low-level pointer injection seam.
#[async_trait]
pub trait PointerDriver: Send + Sync {
    async fn click(&self, pos: Position) -> Result<()>;
    async fn double_click(&self, pos: Position) -> Result<()>;
    async fn right_click(&self, pos: Position) -> Result<()>;
    async fn move_to(&self, pos: Position) -> Result<()>;
}

/// [`ActionBackend`] that dispatches the stock pointer actions to a driver.
pub struct PointerActions<D: PointerDriver> {
    driver: D,
}

impl<D: PointerDriver> PointerActions<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl<D: PointerDriver> ActionBackend for PointerActions<D> {
    async fn run(&self, action: &str, pos: Position, offset: Position) -> Result<()> {
        let target = pos.offset(offset.x, offset.y);
        tracing::debug!(action, %target, "Dispatching pointer action");
        match action {
            "click" => self.driver.click(target).await,
            "double_click" => self.driver.double_click(target).await,
            "right_click" => self.driver.right_click(target).await,
            "move" => self.driver.move_to(target).await,
            other => Err(TapdanceError::UnknownAction(other.to_string())),
        }
    }
}
