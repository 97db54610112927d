use crate::auth;
use crate::auth::TenantError;
use crate::db::TenantId;

#[test]
fn tenant_id_accepts_valid_identifiers() {
    for raw in ["abc", "tenant_1", "ACME", "a_b_c", "t_9lives", &"x".repeat(63)] {
        assert!(TenantId::parse(raw).is_ok(), "rejected valid id {raw:?}");
    }
}

#[test]
fn tenant_id_rejects_invalid_identifiers() {
    let cases = [
        "",
        "ab",                 // below minimum length
        &"x".repeat(64),      // above maximum length
        "has-dash",
        "has space",
        "semi;colon",
        "quote\"d",
        "pg_catalog; DROP SCHEMA public", // injection attempt
        "schéma",
    ];
    for raw in cases {
        assert!(TenantId::parse(raw).is_err(), "accepted invalid id {raw:?}");
    }
}

#[test]
fn header_wins_over_query_and_claim() {
    let tenant =
        auth::resolve_tenant(Some("from_header"), Some("from_query"), Some("from_claim")).unwrap();
    assert_eq!(tenant.as_str(), "from_header");
}

#[test]
fn query_wins_over_claim() {
    let tenant = auth::resolve_tenant(None, Some("from_query"), Some("from_claim")).unwrap();
    assert_eq!(tenant.as_str(), "from_query");
}

#[test]
fn claim_is_the_fallback() {
    let tenant = auth::resolve_tenant(None, None, Some("from_claim")).unwrap();
    assert_eq!(tenant.as_str(), "from_claim");
}

#[test]
fn empty_strings_count_as_absent() {
    let tenant = auth::resolve_tenant(Some(""), Some("   "), Some("from_claim")).unwrap();
    assert_eq!(tenant.as_str(), "from_claim");
}

#[test]
fn no_source_is_tenant_required() {
    let err = auth::resolve_tenant(None, None, None).unwrap_err();
    assert!(matches!(err, TenantError::TenantRequired));

    let err = auth::resolve_tenant(Some(""), None, Some("")).unwrap_err();
    assert!(matches!(err, TenantError::TenantRequired));
}

#[test]
fn winning_source_must_be_valid() {
    // An invalid header does not fall through to the valid claim.
    let err = auth::resolve_tenant(Some("bad-tenant!"), None, Some("good_tenant")).unwrap_err();
    assert!(matches!(err, TenantError::InvalidTenantId));
}

#[test]
fn exempt_prefixes_match_whole_segments() {
    assert!(auth::is_tenant_exempt("/auth"));
    assert!(auth::is_tenant_exempt("/auth/login"));
    assert!(auth::is_tenant_exempt("/users/me/tenants"));
    assert!(auth::is_tenant_exempt("/health"));

    assert!(!auth::is_tenant_exempt("/api/profile"));
    assert!(!auth::is_tenant_exempt("/authx"));
    assert!(!auth::is_tenant_exempt("/healthcheck"));
}
