use crate::app::pipeline::events::win::context::WinEventContext;
use crate::core::events::dataurl::DataUrl;
use crate::core::events::model::WinEvent;
use crate::core::pipeline::BlockingTask;
use anyhow::{Error, anyhow};

/// Decodes the pixel url back into a typed win event. Junk urls fail
/// the pipeline, which the handler renders as a 400.
pub struct ExtractWinEventTask;

impl BlockingTask<WinEventContext, Error> for ExtractWinEventTask {
    fn run(&self, context: &WinEventContext) -> Result<(), Error> {
        let data_url = DataUrl::from(&context.url)?;
        let event = WinEvent::from(&data_url)?;

        if event.clearing_price < 0.0 || event.gross_price < 0.0 {
            return Err(anyhow!("Win event carries negative prices"));
        }

        context
            .event
            .set(event)
            .map_err(|_| anyhow!("Win event already extracted"))?;

        Ok(())
    }
}
