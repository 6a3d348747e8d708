use crate::view::BlockView;
use alloy::primitives::BlockNumber;

/// Analysis driven block by block over a history dump.
///
/// Hooks run strictly one after another: `on_init` once, `on_block` for every block from 1 up
/// to the dump's latest block, then `on_done` once. An error from any hook aborts the replay
/// and `on_done` is not called.
#[async_trait::async_trait]
pub trait AnalysisPlugin: Send {
    /// Runs before the first block. The view is not bound to a block yet; use it to reach
    /// the data source, e.g. to enable state tracking.
    async fn on_init(&mut self, _view: &mut BlockView<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_block(
        &mut self,
        _block_number: BlockNumber,
        _view: &mut BlockView<'_>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_done(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl<P: AnalysisPlugin + ?Sized> AnalysisPlugin for Box<P> {
    async fn on_init(&mut self, view: &mut BlockView<'_>) -> anyhow::Result<()> {
        (**self).on_init(view).await
    }

    async fn on_block(
        &mut self,
        block_number: BlockNumber,
        view: &mut BlockView<'_>,
    ) -> anyhow::Result<()> {
        (**self).on_block(block_number, view).await
    }

    async fn on_done(&mut self) -> anyhow::Result<()> {
        (**self).on_done().await
    }
}
