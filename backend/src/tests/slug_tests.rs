use crate::db::{ProviderKind, TenantId};
use crate::services::onboarding;

#[test]
fn slug_comes_from_the_email_local_part() {
    assert_eq!(onboarding::derive_schema_slug("john.doe@example.com"), "john_doe");
    assert_eq!(onboarding::derive_schema_slug("alice@example.com"), "alice");
    assert_eq!(onboarding::derive_schema_slug("a+b-c@example.com"), "a_b_c");
}

#[test]
fn slug_is_lowercased() {
    assert_eq!(onboarding::derive_schema_slug("John.Doe@Example.com"), "john_doe");
}

#[test]
fn slug_starting_with_digit_gets_prefixed() {
    assert_eq!(onboarding::derive_schema_slug("9lives@example.com"), "t_9lives");
}

#[test]
fn short_slug_gets_prefixed_to_minimum_length() {
    assert_eq!(onboarding::derive_schema_slug("ab@example.com"), "t_ab");
    assert_eq!(onboarding::derive_schema_slug("a@example.com"), "t_a");
}

#[test]
fn long_slug_leaves_room_for_collision_suffix() {
    let local = "x".repeat(100);
    let slug = onboarding::derive_schema_slug(&format!("{local}@example.com"));
    assert_eq!(slug.len(), 59);

    // worst case candidate still fits the identifier limit
    let candidate = onboarding::slug_candidate(&slug, onboarding::MAX_SLUG_ATTEMPTS - 1);
    assert!(candidate.len() <= 63);
    assert!(TenantId::parse(&candidate).is_ok());
}

#[test]
fn derived_slugs_always_parse_as_tenant_ids() {
    let emails = [
        "john.doe@example.com",
        "9lives@example.com",
        "a@example.com",
        "UPPER.case+tag@example.com",
        "weird!#$%chars@example.com",
    ];
    for email in emails {
        let slug = onboarding::derive_schema_slug(email);
        assert!(TenantId::parse(&slug).is_ok(), "slug {slug:?} from {email:?} is invalid");
    }
}

#[test]
fn first_candidate_is_the_bare_slug() {
    assert_eq!(onboarding::slug_candidate("alice", 0), "alice");
    assert_eq!(onboarding::slug_candidate("alice", 1), "alice_1");
    assert_eq!(onboarding::slug_candidate("alice", 42), "alice_42");
}

#[test]
fn tenant_name_prefers_the_full_name() {
    assert_eq!(
        onboarding::derive_tenant_name("Ada", "Lovelace", "ada@example.com"),
        "Ada Lovelace's Workspace"
    );
    assert_eq!(onboarding::derive_tenant_name("Ada", "", "ada@example.com"), "Ada's Workspace");
    assert_eq!(onboarding::derive_tenant_name("", "", "ada@example.com"), "ada's Workspace");
    assert_eq!(onboarding::derive_tenant_name("  ", " ", "ada@example.com"), "ada's Workspace");
}

#[test]
fn placeholder_email_is_provider_scoped() {
    assert_eq!(
        onboarding::placeholder_email(ProviderKind::TikTok, "abc123"),
        "tiktok_abc123@placeholder.local"
    );
    assert_eq!(
        onboarding::placeholder_email(ProviderKind::Google, "g-1"),
        "google_g-1@placeholder.local"
    );
}

#[test]
fn provider_kind_round_trips_through_path_segments() {
    for provider in [ProviderKind::Google, ProviderKind::Facebook, ProviderKind::TikTok] {
        assert_eq!(ProviderKind::from_path(provider.as_str()), Some(provider));
    }
    assert_eq!(ProviderKind::from_path("github"), None);
    assert_eq!(ProviderKind::from_path("Google"), None);
}
