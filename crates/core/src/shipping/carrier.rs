//! Carriers offered through the Melhor Envio integration.

use serde::Serialize;

/// A carrier service the admin can allow or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Carrier {
    /// Identifier stored in `allowedCarriers`.
    pub id: &'static str,
    /// Name shown to admins and matched against quote names.
    pub name: &'static str,
}

/// Every carrier service the integration knows about.
pub const CARRIER_CATALOG: [Carrier; 7] = [
    Carrier { id: "PAC", name: "Correios PAC" },
    Carrier { id: "SEDEX", name: "Correios SEDEX" },
    Carrier { id: "Jadlog .Package", name: "Jadlog .Package" },
    Carrier { id: "Jadlog .Com", name: "Jadlog .Com" },
    Carrier { id: "Azul Cargo", name: "Azul Cargo" },
    Carrier { id: "Latam Cargo", name: "Latam Cargo" },
    Carrier { id: "Loggi", name: "Loggi" },
];

/// Look up a carrier by id.
#[must_use]
pub fn find_carrier(id: &str) -> Option<&'static Carrier> {
    CARRIER_CATALOG.iter().find(|carrier| carrier.id == id)
}

/// Whether `id` names a catalog carrier.
#[must_use]
pub fn is_known_carrier(id: &str) -> bool {
    find_carrier(id).is_some()
}
