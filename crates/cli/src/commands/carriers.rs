//! Carrier catalog listing.

use std::io::Write;

use atelie_core::shipping::CARRIER_CATALOG;

use super::CommandError;

/// Print every catalog carrier as `id<TAB>name`.
pub fn list(out: &mut impl Write) -> Result<(), CommandError> {
    for carrier in &CARRIER_CATALOG {
        writeln!(out, "{}\t{}", carrier.id, carrier.name)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_prints_catalog() {
        let mut out = Vec::new();
        list(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), CARRIER_CATALOG.len());
        assert!(text.starts_with("PAC\tCorreios PAC\n"));
        assert!(text.contains("Jadlog .Package\tJadlog .Package\n"));
    }
}
