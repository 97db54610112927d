use chrono::Utc;
use sqlx::Acquire;
use thiserror::Error;

use crate::db;
use crate::db::{DbPool, Membership, NewTenant, NewUser, ProviderKind, StoreError, Tenant, TenantId, User};
use crate::services::sso::ExternalIdentity;

/// Upper bound on suffixed slug candidates tried when a derived schema name
/// keeps colliding. Hitting it means the catalog is saturated around the base
/// slug and the signup fails rather than looping forever.
pub const MAX_SLUG_ATTEMPTS: u32 = 100;

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("An account with this email already exists")]
    DuplicateAccount,

    #[error("Could not allocate a unique tenant namespace")]
    SlugAttemptsExhausted,

    #[error("Tenant provisioning failed: {0}")]
    ProvisioningFailed(#[from] StoreError),
}

/// Everything needed to create an account together with its tenant. When
/// `tenant` is set the user asked for that exact namespace; when absent the
/// namespace slug is derived from the email address. Either way an existing
/// tenant owning the slug is joined rather than treated as a failure; numeric
/// suffixes only come into play when a concurrent signup wins the insert race.
#[derive(Debug, Default)]
pub struct ProvisionParams {
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    pub tiktok_id: Option<String>,
    pub tenant: Option<TenantId>,
    pub tenant_name: Option<String>,
}

#[derive(Debug)]
pub struct Provisioned {
    pub user: User,
    pub tenant: Tenant,
    pub membership: Membership,
    pub tenant_created: bool,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(d) if d.kind() == sqlx::error::ErrorKind::UniqueViolation)
}

/// Creates the user, resolves or creates the tenant namespace, and links the
/// two in a single transaction, so a failure at any step leaves no partial
/// account, no orphaned catalog row and no dangling schema.
///
/// Namespace creation runs under a savepoint: losing the insert race to a
/// concurrent signup aborts only the savepoint, after which the loop re-checks
/// the catalog and either joins the winner's tenant (explicit namespace) or
/// moves on to the next suffixed slug (derived namespace).
pub async fn provision_user_and_tenant(
    pool: &DbPool,
    params: &ProvisionParams,
) -> Result<Provisioned, OnboardingError> {
    let mut tx = pool.begin().await.map_err(StoreError::Database)?;

    if db::find_user_by_email(&mut *tx, &params.email).await?.is_some() {
        return Err(OnboardingError::DuplicateAccount);
    }

    let new_user = NewUser {
        email: params.email.clone(),
        password_hash: params.password_hash.clone(),
        first_name: params.first_name.clone(),
        last_name: params.last_name.clone(),
        email_verified: params.email_verified,
        google_id: params.google_id.clone(),
        facebook_id: params.facebook_id.clone(),
        tiktok_id: params.tiktok_id.clone(),
    };
    let user = match db::create_user(&mut *tx, &new_user).await {
        Ok(user) => user,
        Err(StoreError::Database(e)) if is_unique_violation(&e) => {
            return Err(OnboardingError::DuplicateAccount);
        }
        Err(e) => return Err(e.into()),
    };

    let tenant_name = params
        .tenant_name
        .clone()
        .unwrap_or_else(|| derive_tenant_name(&params.first_name, &params.last_name, &params.email));
    let base_slug = derive_schema_slug(&params.email);

    let mut outcome = None;
    for attempt in 0..MAX_SLUG_ATTEMPTS {
        let candidate = match &params.tenant {
            Some(tenant) => tenant.clone(),
            None => slug_candidate(&base_slug, attempt)
                .parse()
                .map_err(|_| OnboardingError::SlugAttemptsExhausted)?,
        };

        // A pre-existing tenant for the candidate slug means "join", never
        // "fail": registering with an email whose derived slug matches an
        // existing workspace adds the user to it as a member.
        if let Some(existing) = db::find_tenant_by_schema(&mut *tx, candidate.as_str()).await? {
            outcome = Some((existing, false));
            break;
        }

        let mut sp = tx.begin().await.map_err(StoreError::Database)?;
        match db::create_tenant(
            &mut *sp,
            &NewTenant {
                schema_name: candidate.clone(),
                name: tenant_name.clone(),
                display_name: tenant_name.clone(),
                domain_url: String::new(),
            },
        )
        .await
        {
            Ok(tenant) => {
                db::create_namespace(&mut *sp, &candidate)
                    .await
                    .map_err(StoreError::Database)?;
                sp.commit().await.map_err(StoreError::Database)?;
                outcome = Some((tenant, true));
                break;
            }
            Err(StoreError::Database(e)) if is_unique_violation(&e) => {
                // lost the insert race; release the savepoint and re-check
                sp.rollback().await.map_err(StoreError::Database)?;
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
    let Some((tenant, tenant_created)) = outcome else {
        return Err(OnboardingError::SlugAttemptsExhausted);
    };

    // The first account linked to a tenant administers it.
    let member_count = db::count_memberships_for_tenant(&mut *tx, &tenant.schema_name).await?;
    let role = if member_count == 0 { db::ROLE_ADMIN } else { db::ROLE_MEMBER };

    // The user row was created in this transaction, so this is necessarily
    // their first membership and therefore their primary tenant.
    let membership =
        db::create_membership(&mut *tx, user.id, &tenant.schema_name, role, true).await?;

    tx.commit().await.map_err(StoreError::Database)?;
    tracing::info!(
        user_id = user.id,
        tenant = %tenant.schema_name,
        role,
        tenant_created,
        "Provisioned user and tenant"
    );

    Ok(Provisioned { user, tenant, membership, tenant_created })
}

/// Resolve an external identity to a local account, creating one (with a full
/// tenant provision) on first sight. Matching order: provider external id
/// first, then email linkage, then a fresh account.
pub async fn find_or_create_via_oauth(
    pool: &DbPool,
    identity: &ExternalIdentity,
) -> Result<(User, bool), OnboardingError> {
    if let Some(user) =
        db::find_user_by_external_id(pool, identity.provider, &identity.external_id).await?
    {
        db::touch_last_login(pool, user.id).await?;
        return Ok((user, false));
    }

    if let Some(email) = &identity.email
        && let Some(user) = db::find_user_by_email(pool, email).await?
    {
        db::link_external_id(pool, user.id, identity.provider, &identity.external_id).await?;
        tracing::info!(user_id = user.id, provider = %identity.provider, "Linked external identity to existing account");
        return Ok((user, false));
    }

    let email = identity
        .email
        .clone()
        .unwrap_or_else(|| placeholder_email(identity.provider, &identity.external_id));

    let mut params = ProvisionParams {
        email,
        first_name: identity.first_name.clone(),
        last_name: identity.last_name.clone(),
        email_verified: identity.email_verified,
        ..ProvisionParams::default()
    };
    match identity.provider {
        ProviderKind::Google => params.google_id = Some(identity.external_id.clone()),
        ProviderKind::Facebook => params.facebook_id = Some(identity.external_id.clone()),
        ProviderKind::TikTok => params.tiktok_id = Some(identity.external_id.clone()),
    }

    let provisioned = provision_user_and_tenant(pool, &params).await?;
    Ok((provisioned.user, true))
}

/// The tenant schema a fresh token should carry for this user, if any.
pub async fn primary_tenant_schema(
    db: impl sqlx::PgExecutor<'_>,
    user_id: i64,
) -> Result<Option<String>, StoreError> {
    let membership = db::find_primary_membership(db, user_id).await?;
    Ok(membership.map(|m| m.tenant_schema))
}

/// Human-facing tenant name: `<owner>'s Workspace`, where the owner is the
/// user's full name when known and the email local part otherwise.
#[must_use]
pub fn derive_tenant_name(first_name: &str, last_name: &str, email: &str) -> String {
    let full = format!("{} {}", first_name.trim(), last_name.trim());
    let full = full.trim();
    let owner = if full.is_empty() {
        email.split('@').next().unwrap_or(email)
    } else {
        full
    };
    format!("{owner}'s Workspace")
}

/// Base namespace slug from the email local part: lowercased, every
/// non-alphanumeric squashed to `_`, prefixed when it would start with a digit
/// or fall under the minimum length, and truncated to leave room for a
/// collision suffix.
#[must_use]
pub fn derive_schema_slug(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    let mut slug: String = local
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if slug.is_empty() {
        return format!("tenant_{}", Utc::now().timestamp());
    }
    if slug.chars().next().is_some_and(|c| c.is_ascii_digit()) || slug.len() < db::TENANT_ID_MIN_LEN
    {
        slug = format!("t_{slug}");
    }
    slug.truncate(59);
    slug
}

/// Attempt 0 is the bare base slug; later attempts append `_N`.
#[must_use]
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{base}_{attempt}")
    }
}

/// Synthetic address for providers that grant no email scope; unique per
/// external id and never routable.
#[must_use]
pub fn placeholder_email(provider: ProviderKind, external_id: &str) -> String {
    format!("{provider}_{external_id}@placeholder.local")
}

