//! Site adapters, one per marketplace family.

pub mod auction;
pub mod common;
pub mod elevenst;
pub mod gmarket;
pub mod musinsa;
pub mod oliveyoung;
pub mod twentynine;
pub mod universal;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use auction::AuctionAdapter;
pub use elevenst::ElevenStAdapter;
pub use gmarket::GmarketAdapter;
pub use musinsa::MusinsaAdapter;
pub use oliveyoung::OliveYoungAdapter;
pub use twentynine::TwentyNineAdapter;
pub use universal::UniversalAdapter;

use crate::plugins::traits::{ExtractionSettings, SiteAdapter};

/// The closed set of supported adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Musinsa,
    OliveYoung,
    Gmarket,
    #[serde(rename = "29cm")]
    TwentyNine,
    Auction,
    #[serde(rename = "11st")]
    ElevenSt,
    Universal,
}

impl AdapterKind {
    /// Resolution order; the catch-all comes last.
    pub const ALL: [AdapterKind; 7] = [
        AdapterKind::Musinsa,
        AdapterKind::OliveYoung,
        AdapterKind::Gmarket,
        AdapterKind::TwentyNine,
        AdapterKind::Auction,
        AdapterKind::ElevenSt,
        AdapterKind::Universal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AdapterKind::Musinsa => "musinsa",
            AdapterKind::OliveYoung => "oliveyoung",
            AdapterKind::Gmarket => "gmarket",
            AdapterKind::TwentyNine => "29cm",
            AdapterKind::Auction => "auction",
            AdapterKind::ElevenSt => "11st",
            AdapterKind::Universal => "universal",
        }
    }

    pub fn build(&self, settings: ExtractionSettings) -> Arc<dyn SiteAdapter> {
        match self {
            AdapterKind::Musinsa => Arc::new(MusinsaAdapter::new(settings)),
            AdapterKind::OliveYoung => Arc::new(OliveYoungAdapter::new(settings)),
            AdapterKind::Gmarket => Arc::new(GmarketAdapter::new(settings)),
            AdapterKind::TwentyNine => Arc::new(TwentyNineAdapter::new(settings)),
            AdapterKind::Auction => Arc::new(AuctionAdapter::new(settings)),
            AdapterKind::ElevenSt => Arc::new(ElevenStAdapter::new(settings)),
            AdapterKind::Universal => Arc::new(UniversalAdapter::new(settings)),
        }
    }
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
