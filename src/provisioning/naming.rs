//! Pure naming rules. The mail nickname is the lookup key for a customer's
//! group whenever no group id has been stored yet, so changing anything here
//! changes which remote group a customer resolves to.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W").expect("non-word pattern is valid"));

/// Quote and offer numbers carry a two digit revision qualifier, e.g. `A12345-07`.
static REVISION_QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d{2}$").expect("revision qualifier pattern is valid"));

/// Characters that the remote platform rejects in a mail nickname.
const NICKNAME_BLACKLIST: &[char] = &[
    'å', 'ä', 'ö', 'Å', 'Ä', 'Ö', 'ü', 'Ü', 'ø', 'Ø', 'æ', 'Æ', '@', '(', ')', '\\', '[', ']', '"',
    ';', ':', '.', '<', '>', ',', '!', '#', '$', '%', '&', '\'', '*', '+', '/', '=', '?', '^', '`',
    '{', '|', '}', '~',
];

pub const CUSTOMER_NICKNAME_SUFFIX: &str = "Kund";
pub const SUPPLIER_NICKNAME_SUFFIX: &str = "Lev";

pub const ORDERS_FOLDER_NAME: &str = "Order";
pub const OFFERS_FOLDER_NAME: &str = "Offert";
pub const PURCHASES_FOLDER_NAME: &str = "Inköp";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum CustomerType {
    #[default]
    Customer,
    Supplier,
}

impl CustomerType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Supplier => "Supplier",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "supplier" => Ok(Self::Supplier),
            _ => Err("customer type must be one of: Customer, Supplier".to_string()),
        }
    }

    pub fn nickname_suffix(self) -> &'static str {
        match self {
            Self::Customer => CUSTOMER_NICKNAME_SUFFIX,
            Self::Supplier => SUPPLIER_NICKNAME_SUFFIX,
        }
    }
}

impl std::fmt::Display for CustomerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CustomerType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        crate::shared::serde_ext::parse_via_string(deserializer, "customer type", Self::parse)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum OrderType {
    #[default]
    Order,
    Project,
    Quote,
    Offer,
    Purchase,
}

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Order => "Order",
            Self::Project => "Project",
            Self::Quote => "Quote",
            Self::Offer => "Offer",
            Self::Purchase => "Purchase",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "order" => Ok(Self::Order),
            "project" => Ok(Self::Project),
            "quote" => Ok(Self::Quote),
            "offer" => Ok(Self::Offer),
            "purchase" => Ok(Self::Purchase),
            _ => Err(
                "order type must be one of: Order, Project, Quote, Offer, Purchase".to_string(),
            ),
        }
    }

    pub fn parent_folder(self) -> ParentFolder {
        match self {
            Self::Order | Self::Project => ParentFolder::Orders,
            Self::Quote | Self::Offer => ParentFolder::Offers,
            Self::Purchase => ParentFolder::Purchases,
        }
    }

    pub fn carries_revision_qualifier(self) -> bool {
        matches!(self, Self::Quote | Self::Offer)
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        crate::shared::serde_ext::parse_via_string(deserializer, "order type", Self::parse)
    }
}

/// The folder directly under a customer's general folder that holds orders of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentFolder {
    Orders,
    Offers,
    Purchases,
}

impl ParentFolder {
    pub fn name(self) -> &'static str {
        match self {
            Self::Orders => ORDERS_FOLDER_NAME,
            Self::Offers => OFFERS_FOLDER_NAME,
            Self::Purchases => PURCHASES_FOLDER_NAME,
        }
    }
}

pub fn parent_folder_name(order_type: OrderType) -> &'static str {
    order_type.parent_folder().name()
}

/// Strips the trailing `-NN` revision from quote and offer numbers; every other
/// type keeps its number unchanged.
pub fn normalize_order_external_id(external_id: &str, order_type: OrderType) -> String {
    let trimmed = external_id.trim();
    if order_type.carries_revision_qualifier() {
        REVISION_QUALIFIER.replace(trimmed, "").into_owned()
    } else {
        trimmed.to_string()
    }
}

/// Derives the mail nickname used to find a customer's group by name.
///
/// The customer name loses every non-word character, then
/// `<name>-<externalId>-<suffix>` is filtered through the nickname blacklist.
/// `é` is kept as `e`; any other non-ASCII character and all whitespace is
/// dropped. Total and deterministic.
pub fn mail_nickname(name: &str, external_id: &str, customer_type: CustomerType) -> String {
    let sanitized_name = NON_WORD.replace_all(name, "");
    let raw = format!(
        "{sanitized_name}-{}-{}",
        external_id,
        customer_type.nickname_suffix()
    );
    raw.chars()
        .filter_map(|ch| match ch {
            'é' => Some('e'),
            'É' => Some('E'),
            ch if ch.is_whitespace() || NICKNAME_BLACKLIST.contains(&ch) => None,
            ch if !ch.is_ascii() => None,
            ch => Some(ch),
        })
        .collect()
}

/// Characters a channel display name may not contain.
const CHANNEL_NAME_BLACKLIST: &[char] = &[
    '~', '#', '%', '&', '*', '{', '}', '+', '/', '\\', ':', '<', '>', '?', '|', '\'', '"',
];

pub const CHANNEL_NAME_MAX_CHARS: usize = 50;

/// Channel name for a project order: the order number, followed by the
/// additional info when there is any, cleaned and cut to the platform limit.
pub fn channel_display_name(external_id: &str, additional_info: &str) -> String {
    let raw = if additional_info.trim().is_empty() {
        external_id.trim().to_string()
    } else {
        format!("{} {}", external_id.trim(), additional_info.trim())
    };
    let cleaned: String = raw
        .chars()
        .filter(|ch| !CHANNEL_NAME_BLACKLIST.contains(ch) && !ch.is_control())
        .take(CHANNEL_NAME_MAX_CHARS)
        .collect();
    cleaned
        .trim_end_matches(['.', ' '])
        .trim_start()
        .to_string()
}
