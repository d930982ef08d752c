use regex::Regex;
use std::sync::LazyLock;

static PRICE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9][0-9,]*)").expect("price regex is valid"));

/// Keywords that mark a product as unavailable, matched case-insensitively.
pub const SOLD_OUT_KEYWORDS: &[&str] = &[
    "품절",
    "일시품절",
    "판매종료",
    "매진",
    "sold out",
    "soldout",
    "out of stock",
];

/// Text containing any of these is never treated as a price candidate.
pub const NOISE_KEYWORDS: &[&str] = &[
    "적립", "포인트", "포인트적립", "쿠폰", "배송", "배송비", "리뷰", "평점",
    "적용", "최대", "%", "기간", "혜택", "사이즈", "수량", "옵션", "남은",
    "품절", "무이자", "카드", "스마일", "네이버", "카카오", "머니",
    "coupon", "shipping", "delivery", "review", "rating",
    "benefit", "point", "signin", "login", "max",
    "period", "option", "quantity", "sold out",
    "card", "pay", "money", "event", "notice",
];

/// Parses the first digit run (thousands separators allowed) as an integer amount.
pub fn normalize_price(text: &str) -> Option<u64> {
    let captures = PRICE_REGEX.captures(text)?;
    captures.get(1)?.as_str().replace(',', "").parse().ok()
}

pub fn contains_keyword(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|kw| lower.contains(&kw.to_lowercase()))
}

pub fn contains_sold_out_keyword(text: &str) -> bool {
    contains_keyword(text, SOLD_OUT_KEYWORDS)
}

/// Floor and noise filter shared by every adapter.
#[derive(Debug, Clone)]
pub struct PriceRules {
    pub floor: u64,
    pub extra_noise: Vec<String>,
}

impl PriceRules {
    pub fn new(floor: u64) -> Self {
        Self {
            floor,
            extra_noise: Vec::new(),
        }
    }

    pub fn with_extra_noise(mut self, keywords: &[&str]) -> Self {
        self.extra_noise
            .extend(keywords.iter().map(|kw| kw.to_string()));
        self
    }

    pub fn is_valid(&self, amount: u64) -> bool {
        amount >= self.floor
    }

    /// Parses `text` and rejects amounts under the floor.
    pub fn parse(&self, text: &str) -> Option<u64> {
        normalize_price(text).filter(|amount| self.is_valid(*amount))
    }

    pub fn looks_like_price(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        if contains_keyword(text, NOISE_KEYWORDS) {
            return false;
        }
        let lower = text.to_lowercase();
        !self
            .extra_noise
            .iter()
            .any(|kw| lower.contains(&kw.to_lowercase()))
    }

    /// Smallest valid amount among noise-free texts.
    ///
    /// Discounted and member prices are normally the smallest figure in a
    /// price block, so crossed-out list prices lose.
    pub fn min_candidate<'a, I>(&self, texts: I) -> Option<u64>
    where
        I: IntoIterator<Item = &'a str>,
    {
        texts
            .into_iter()
            .filter(|text| self.looks_like_price(text))
            .filter_map(|text| self.parse(text))
            .min()
    }
}
