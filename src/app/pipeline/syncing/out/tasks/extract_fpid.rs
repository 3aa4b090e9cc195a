use crate::app::pipeline::syncing::out::context::{SyncOutContext, SyncOutResponse};
use crate::core::pipeline::BlockingTask;
use crate::core::usersync::{constants, utils};
use anyhow::{Error, anyhow, bail};
use tracing::debug;

/// Resolves the caller's first-party ID: the existing cookie when
/// valid, a freshly minted one otherwise. Opted-out users get an
/// empty response and the pipeline stops.
pub struct ExtractFpidTask;

impl BlockingTask<SyncOutContext, Error> for ExtractFpidTask {
    fn run(&self, context: &SyncOutContext) -> Result<(), Error> {
        if context
            .cookies
            .contains_key(constants::CONST_ARX_OPTOUT_COOKIE)
        {
            context
                .response
                .set(SyncOutResponse {
                    status: "ok",
                    bidders: Vec::new(),
                })
                .map_err(|_| anyhow!("Sync response already assigned"))?;

            bail!("User opted out of syncing");
        }

        let existing = context
            .cookies
            .get(constants::CONST_ARX_FPID_COOKIE)
            .filter(|fpid| utils::validate_fpid(fpid));

        let fpid = match existing {
            Some(fpid) => fpid.clone(),
            None => {
                let minted = utils::generate_fpid();
                debug!("Minted fresh fpid for sync call");
                context.minted.set(()).ok();
                minted
            }
        };

        context
            .fpid
            .set(fpid)
            .map_err(|_| anyhow!("Fpid already assigned on context"))?;

        Ok(())
    }
}
