//! Turns provider places into result records.

use gridscout_core::{BrandQuery, ResultRecord};
use sha2::{Digest, Sha256};

use crate::types::RawPlace;

const PLACE_URL_PREFIX: &str = "https://www.google.com/maps/place/?q=place_id:";

/// Public map link for a place.
#[must_use]
pub fn place_url(place_id: &str) -> String {
    format!("{PLACE_URL_PREFIX}{place_id}")
}

/// Builds the record for `place` found while searching for `brand`.
///
/// Returns `None` when the place has no usable `place_id`; such places are
/// never persisted or streamed.
#[must_use]
pub fn to_result_record(job_id: &str, brand: &BrandQuery, place: &RawPlace) -> Option<ResultRecord> {
    let place_id = place
        .place_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_owned();

    let address = place
        .vicinity
        .clone()
        .or_else(|| place.formatted_address.clone())
        .filter(|a| !a.trim().is_empty());
    let location = place.geometry.as_ref().map(|g| g.location);

    Some(ResultRecord {
        job_id: job_id.to_owned(),
        search_brand: brand.brand.clone(),
        search_sku: brand.sku.clone(),
        search_category: brand.category.clone(),
        gmaps_category: place.types.first().cloned(),
        name: place.name.clone(),
        address,
        latitude: location.map(|l| l.lat),
        longitude: location.map(|l| l.lng),
        business_status: place.business_status.clone(),
        place_url: place_url(&place_id),
        is_brand_match: brand.matches_name(&place.name),
        place_id,
    })
}

/// Short SHA-256 fingerprint of a credential, safe to log and persist.
#[must_use]
pub fn key_fingerprint(api_key: &str) -> String {
    let digest = Sha256::digest(api_key.as_bytes());
    digest
        .iter()
        .take(6)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Geometry, LatLng};

    fn brand() -> BrandQuery {
        BrandQuery {
            brand: "Amul".to_owned(),
            sku: "AM-500".to_owned(),
            category: "Dairy".to_owned(),
        }
    }

    fn place(place_id: Option<&str>, name: &str) -> RawPlace {
        RawPlace {
            place_id: place_id.map(str::to_owned),
            name: name.to_owned(),
            vicinity: Some("Sector 18, Noida".to_owned()),
            formatted_address: None,
            geometry: Some(Geometry {
                location: LatLng {
                    lat: 28.57,
                    lng: 77.32,
                },
            }),
            types: vec!["grocery_or_supermarket".to_owned(), "store".to_owned()],
            business_status: Some("OPERATIONAL".to_owned()),
        }
    }

    #[test]
    fn builds_full_record() {
        let record = to_result_record("job-1", &brand(), &place(Some("ChIJ9"), "AMUL Parlour"))
            .expect("record");
        assert_eq!(record.job_id, "job-1");
        assert_eq!(record.search_brand, "Amul");
        assert_eq!(record.search_sku, "AM-500");
        assert_eq!(record.search_category, "Dairy");
        assert_eq!(record.gmaps_category.as_deref(), Some("grocery_or_supermarket"));
        assert_eq!(record.address.as_deref(), Some("Sector 18, Noida"));
        assert_eq!(record.latitude, Some(28.57));
        assert_eq!(record.place_id, "ChIJ9");
        assert_eq!(
            record.place_url,
            "https://www.google.com/maps/place/?q=place_id:ChIJ9"
        );
        assert!(record.is_brand_match);
    }

    #[test]
    fn missing_place_id_yields_no_record() {
        assert!(to_result_record("job-1", &brand(), &place(None, "Amul")).is_none());
        assert!(to_result_record("job-1", &brand(), &place(Some("  "), "Amul")).is_none());
    }

    #[test]
    fn non_matching_name_is_flagged() {
        let record =
            to_result_record("job-1", &brand(), &place(Some("x"), "Mother Dairy Booth")).unwrap();
        assert!(!record.is_brand_match);
    }

    #[test]
    fn falls_back_to_formatted_address_and_tolerates_missing_geometry() {
        let mut p = place(Some("x"), "Amul");
        p.vicinity = None;
        p.formatted_address = Some("12 MG Road, Gurugram".to_owned());
        p.geometry = None;
        p.types.clear();
        let record = to_result_record("j", &brand(), &p).unwrap();
        assert_eq!(record.address.as_deref(), Some("12 MG Road, Gurugram"));
        assert!(record.latitude.is_none());
        assert!(record.gmaps_category.is_none());
    }

    #[test]
    fn fingerprint_is_stable_and_does_not_leak_key() {
        let a = key_fingerprint("secret-key");
        assert_eq!(a.len(), 12);
        assert_eq!(a, key_fingerprint("secret-key"));
        assert_ne!(a, key_fingerprint("other-key"));
        assert!(!a.contains("secret"));
    }
}
