//! Structural bid validation. Rejections drop the bid, never the
//! auction - callers record the reason and move on.

use crate::core::ortb::{Bid, BidRequest, Imp, MediaType};
use strum::Display;

pub const SETTLEMENT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BidRejection {
    UnknownImp,
    NonPositivePrice,
    CurrencyMismatch,
    MediaTypeNotOffered,
    AmbiguousMediaType,
    MissingMarkup,
    SizeNotAllowed,
    BelowFloor,
}

/// Validates one bid against the impression it references and resolves
/// its media type, inferring from the impression when the response
/// omits `mtype`.
pub fn validate_bid(
    req: &BidRequest,
    bid: &Bid,
    response_currency: &str,
) -> Result<MediaType, BidRejection> {
    let imp = match req.imp_by_id(&bid.impid) {
        Some(imp) => imp,
        None => return Err(BidRejection::UnknownImp),
    };

    if bid.price <= 0.0 {
        return Err(BidRejection::NonPositivePrice);
    }

    if !response_currency.is_empty() && response_currency != SETTLEMENT_CURRENCY {
        return Err(BidRejection::CurrencyMismatch);
    }

    let media = resolve_media_type(imp, bid)?;

    if bid.adm.is_empty() {
        // video may render from the nurl alone (wrapper VAST)
        let nurl_acceptable = media == MediaType::Video && !bid.nurl.is_empty();
        if !nurl_acceptable {
            return Err(BidRejection::MissingMarkup);
        }
    }

    if media == MediaType::Banner {
        check_banner_size(imp, bid)?;
    }

    Ok(media)
}

fn resolve_media_type(imp: &Imp, bid: &Bid) -> Result<MediaType, BidRejection> {
    if let Some(mtype) = bid.mtype {
        let claimed = MediaType::from_mtype(mtype).ok_or(BidRejection::AmbiguousMediaType)?;

        if !imp.offers(claimed) {
            return Err(BidRejection::MediaTypeNotOffered);
        }

        return Ok(claimed);
    }

    let offered = imp.media_types();

    match offered.as_slice() {
        [] => Err(BidRejection::MediaTypeNotOffered),
        [only] => Ok(*only),
        _ => {
            // multi-format imp without mtype - sniff the markup
            if bid.adm.trim_start().starts_with("<VAST") && imp.video.is_some() {
                return Ok(MediaType::Video);
            }

            if imp.banner.is_some() && !bid.adm.is_empty() {
                return Ok(MediaType::Banner);
            }

            Err(BidRejection::AmbiguousMediaType)
        }
    }
}

fn check_banner_size(imp: &Imp, bid: &Bid) -> Result<(), BidRejection> {
    let banner = match &imp.banner {
        Some(banner) => banner,
        None => return Ok(()),
    };

    // a bid without dimensions is taken at the imp's primary size
    if bid.w == 0 && bid.h == 0 {
        return Ok(());
    }

    let allowed = banner.allowed_sizes();
    if allowed.is_empty() {
        return Ok(());
    }

    if allowed.contains(&(bid.w, bid.h)) {
        Ok(())
    } else {
        Err(BidRejection::SizeNotAllowed)
    }
}
