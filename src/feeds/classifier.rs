// Maps a decoded payload of a known feed into a ClassifiedEvent.
// Missing or mistyped required fields are errors, never defaulted.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::trace;

use super::wire::{
    DestinationMessage, DetailScaleMessage, EewMessage, ForeignMessage, P2pEnvelope, P2pHypocenter,
    ScalePromptMessage,
};
use super::{FeedIdentity, RawPayload};
use crate::bulletin::types::{
    ClassifiedEvent, EewWarning, ForeignQuake, Hypocenter, HypocenterReport, IntensityDetail,
    IntensityPrompt, ObservedIntensity,
};
use crate::error::ClassifyError;

pub fn classify(feed: FeedIdentity, payload: RawPayload) -> Result<ClassifiedEvent, ClassifyError> {
    match feed {
        FeedIdentity::PrimaryEew => {
            let msg: EewMessage = decode(feed, "EEWWarning", payload)?;
            Ok(ClassifiedEvent::EewWarning(msg.into()))
        }
        FeedIdentity::SecondaryQuake => classify_p2p(payload),
    }
}

fn classify_p2p(payload: RawPayload) -> Result<ClassifiedEvent, ClassifyError> {
    let feed = FeedIdentity::SecondaryQuake;
    // header only, the payload itself is consumed by the body decode below
    let envelope = P2pEnvelope::deserialize(&payload)
        .map_err(|source| ClassifyError::MissingCategory { feed, source })?;
    let category = envelope.issue.kind;
    trace!(%feed, category = %category, "classifying message");

    let event = match category.as_str() {
        "ScalePrompt" => {
            let msg: ScalePromptMessage = decode(feed, &category, payload)?;
            ClassifiedEvent::IntensityPrompt(IntensityPrompt {
                time: msg.earthquake.time,
                max_scale: msg.earthquake.max_scale,
                tsunami: msg.earthquake.domestic_tsunami,
                points: msg
                    .points
                    .into_iter()
                    .map(|p| ObservedIntensity { prefecture: p.pref, address: p.addr, scale: p.scale })
                    .collect(),
            })
        }
        "DetailScale" => {
            let msg: DetailScaleMessage = decode(feed, &category, payload)?;
            ClassifiedEvent::IntensityDetail(IntensityDetail {
                time: msg.earthquake.time,
                max_scale: msg.earthquake.max_scale,
                tsunami: msg.earthquake.domestic_tsunami,
                hypocenter: msg.earthquake.hypocenter.into(),
            })
        }
        "Destination" => {
            let msg: DestinationMessage = decode(feed, &category, payload)?;
            ClassifiedEvent::HypocenterOnly(HypocenterReport {
                time: msg.earthquake.time,
                tsunami: msg.earthquake.domestic_tsunami,
                hypocenter: msg.earthquake.hypocenter.into(),
            })
        }
        "Foreign" => {
            let msg: ForeignMessage = decode(feed, &category, payload)?;
            ClassifiedEvent::ForeignQuake(ForeignQuake {
                time: msg.earthquake.time,
                tsunami: msg.earthquake.domestic_tsunami,
                location: msg.earthquake.hypocenter.name,
                magnitude: msg.earthquake.hypocenter.magnitude,
            })
        }
        _ => ClassifiedEvent::Unhandled { category },
    };
    Ok(event)
}

fn decode<T: DeserializeOwned>(
    feed: FeedIdentity,
    category: &str,
    payload: RawPayload,
) -> Result<T, ClassifyError> {
    serde_json::from_value(payload).map_err(|source| ClassifyError::Malformed {
        feed,
        category: category.to_string(),
        source,
    })
}

impl From<EewMessage> for EewWarning {
    fn from(m: EewMessage) -> Self {
        Self {
            title: m.title,
            serial: m.serial,
            hypocenter: m.hypocenter,
            max_intensity: m.max_intensity,
            magnitude: m.magnitude,
            depth_km: m.depth,
            origin_time: m.origin_time,
            is_sea: m.is_sea,
            is_assumption: m.is_assumption,
            is_cancel: m.is_cancel,
            is_final: m.is_final,
            is_warn: m.is_warn,
            is_training: m.is_training,
            original_text: m.original_text,
        }
    }
}

impl From<P2pHypocenter> for Hypocenter {
    fn from(h: P2pHypocenter) -> Self {
        Self { name: h.name, magnitude: h.magnitude, depth_km: h.depth }
    }
}
