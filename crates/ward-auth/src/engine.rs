//! The per-request authorization decision.
//!
//! [`AccessPolicyEngine::authorize`] resolves the presented [`Credentials`]
//! to an account, reloads it from the store, and runs the checks for the
//! persona the caller is acting as. It either returns an [`AuthContext`]
//! describing who the caller is and what they were granted, or an
//! [`AuthError`]. There is no partial success.

use std::collections::BTreeSet;

use ward_core::{
  persona::Persona,
  policy::{AccessMode, Policy},
  resource::Resource,
  role::Role,
  store::AuthStore,
  subject::{Account, SubjectId},
  token::{Claims, TokenKind},
};

use crate::{
  AuthError, Result, credentials::Credentials, delegation::DelegationAuthority,
  password::PasswordVerifier, token::TokenCodec,
};

// ─── Request context ─────────────────────────────────────────────────────────

/// Facts about the request that the policy checks depend on.
#[derive(Debug, Clone, Copy)]
pub struct RequestFacts<'a> {
  pub mode:       AccessMode,
  /// The `user_id` the request addresses, if any.
  pub target:     Option<SubjectId>,
  pub user_agent: Option<&'a str>,
}

impl RequestFacts<'_> {
  pub fn read() -> Self {
    Self { mode: AccessMode::Read, target: None, user_agent: None }
  }

  pub fn write() -> Self {
    Self { mode: AccessMode::Write, target: None, user_agent: None }
  }

  pub fn on(mut self, target: SubjectId) -> Self {
    self.target = Some(target);
    self
  }
}

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
  /// Username and password at a login route.
  Login,
  /// A bearer token minted for this persona.
  Persona(Persona),
}

/// Delegated read access to another subject's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareTeamAccess {
  pub granter:   SubjectId,
  /// Never empty.
  pub resources: BTreeSet<Resource>,
}

/// The bearer token a request was authorized with.
#[derive(Debug, Clone)]
pub struct BearerToken {
  pub token:  String,
  pub claims: Claims,
}

/// The outcome of a successful authorization, handed to handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
  pub account:   Account,
  pub session:   Session,
  /// Roles held by the caller; only loaded for staff and provider sessions.
  pub roles:     BTreeSet<Role>,
  pub care_team: Option<CareTeamAccess>,
  pub bearer:    Option<BearerToken>,
}

impl AuthContext {
  pub fn subject_id(&self) -> SubjectId { self.account.subject.id }

  pub fn persona(&self) -> Option<Persona> {
    match self.session {
      Session::Login => None,
      Session::Persona(p) => Some(p),
    }
  }

  pub fn has_role(&self, role: Role) -> bool { self.roles.contains(&role) }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct AccessPolicyEngine<'a, S> {
  store: &'a S,
  codec: &'a TokenCodec,
}

impl<'a, S: AuthStore> AccessPolicyEngine<'a, S> {
  pub fn new(store: &'a S, codec: &'a TokenCodec) -> Self { Self { store, codec } }

  pub async fn authorize(
    &self,
    policy: &Policy,
    credentials: Credentials,
    facts: &RequestFacts<'_>,
  ) -> Result<AuthContext> {
    match credentials {
      Credentials::Basic { username, password } => {
        let account = PasswordVerifier::new(self.store)
          .verify_and_admit(&username, &password, facts.user_agent, |account| {
            check_account(policy, account)?;
            check_login(policy, account)
          })
          .await?;
        Ok(AuthContext {
          account,
          session: Session::Login,
          roles: BTreeSet::new(),
          care_team: None,
          bearer: None,
        })
      }
      Credentials::Bearer(token) => {
        let claims = self.resolve_bearer(&token).await?;
        let account = self
          .store
          .get_account(claims.subject_id)
          .await
          .map_err(AuthError::store)?
          .ok_or_else(|| {
            tracing::debug!(subject = %claims.subject_id, "token for unknown subject");
            AuthError::Unauthorized
          })?;
        check_account(policy, &account)?;

        let persona = claims.persona;
        let mut ctx = AuthContext {
          account,
          session: Session::Persona(persona),
          roles: BTreeSet::new(),
          care_team: None,
          bearer: Some(BearerToken { token, claims }),
        };
        match persona {
          Persona::Client => self.check_client(policy, &mut ctx, facts).await?,
          Persona::Staff | Persona::Provider => {
            self
              .check_professional(policy, persona, &mut ctx, facts)
              .await?
          }
        }
        Ok(ctx)
      }
    }
  }

  /// Decode an access token and make sure it has not been revoked.
  pub async fn resolve_bearer(&self, token: &str) -> Result<Claims> {
    let claims = self.codec.decode(token)?;
    if claims.kind != TokenKind::Access {
      tracing::debug!(subject = %claims.subject_id, "refresh token presented as access token");
      return Err(AuthError::Unauthorized);
    }
    if self
      .store
      .is_revoked(token)
      .await
      .map_err(AuthError::store)?
    {
      tracing::debug!(subject = %claims.subject_id, "revoked token presented");
      return Err(AuthError::Unauthorized);
    }
    Ok(claims)
  }

  async fn check_professional(
    &self,
    policy: &Policy,
    persona: Persona,
    ctx: &mut AuthContext,
    facts: &RequestFacts<'_>,
  ) -> Result<()> {
    check_persona(&ctx.account, persona)?;

    let caller = ctx.subject_id();
    let is_self = facts.target == Some(caller);

    if policy.allows_self_service() && is_self {
      return Ok(());
    }
    if !policy.admits_others(persona) {
      return deny("persona not accepted by endpoint");
    }

    ctx.roles = self
      .store
      .roles_for(caller)
      .await
      .map_err(AuthError::store)?;
    let required = policy.roles();
    let role_ok = !required.is_empty() && !ctx.roles.is_disjoint(required);

    let delegated_target = facts
      .target
      .filter(|t| *t != caller && !policy.resources().is_empty());

    let Some(target) = delegated_target else {
      if !required.is_empty() && !role_ok {
        return deny("caller lacks a required role");
      }
      return Ok(());
    };

    let subset = DelegationAuthority::new(self.store)
      .authorized_subset(target, caller, policy.resources())
      .await?;

    if facts.mode.is_read() {
      if !role_ok && subset.is_empty() {
        return deny("no required role and no accepted grant");
      }
    } else if !role_ok {
      return deny("write requires a role");
    }

    if !subset.is_empty() {
      ctx.care_team = Some(CareTeamAccess { granter: target, resources: subset });
    }
    Ok(())
  }

  async fn check_client(
    &self,
    policy: &Policy,
    ctx: &mut AuthContext,
    facts: &RequestFacts<'_>,
  ) -> Result<()> {
    if !policy.admits(Persona::Client) {
      return deny("client persona not accepted by endpoint");
    }
    check_persona(&ctx.account, Persona::Client)?;

    let caller = ctx.subject_id();
    let target = match facts.target {
      None => return Ok(()),
      Some(t) if t == caller => return Ok(()),
      Some(t) => t,
    };

    if !facts.mode.is_read() {
      return deny("delegated access is read-only");
    }
    if policy.resources().is_empty() {
      return deny("endpoint declares no delegable resources");
    }

    let subset = DelegationAuthority::new(self.store)
      .authorized_subset(target, caller, policy.resources())
      .await?;
    if subset.is_empty() {
      return deny("no accepted grant for any declared resource");
    }

    ctx.care_team = Some(CareTeamAccess { granter: target, resources: subset });
    Ok(())
  }
}

// ─── Checks that need no store access ────────────────────────────────────────

fn deny<T>(reason: &'static str) -> Result<T> {
  tracing::debug!(reason, "request denied");
  Err(AuthError::Unauthorized)
}

fn check_account(policy: &Policy, account: &Account) -> Result<()> {
  let subject = &account.subject;
  if subject.deleted {
    return deny("subject is deleted");
  }
  if policy.requires_verified_email() && !subject.email_verified {
    return deny("email not verified");
  }
  if policy.is_internal_only() && !subject.is_internal {
    return deny("endpoint is internal only");
  }
  Ok(())
}

/// The persona must be held and not blocked.
fn check_persona(account: &Account, persona: Persona) -> Result<()> {
  if !account.subject.holds(persona) {
    return deny("subject does not hold persona");
  }
  if account.credential.is_blocked(persona) {
    tracing::warn!(subject = %account.subject.id, %persona, "blocked persona refused");
    return Err(AuthError::Blocked {
      reason: account.credential.block_reason(persona).map(str::to_owned),
    });
  }
  Ok(())
}

/// At least one persona the endpoint accepts must be usable by the subject.
/// If every accepted persona the subject holds is blocked, the block reason
/// is reported.
fn check_login(policy: &Policy, account: &Account) -> Result<()> {
  let held: Vec<Persona> = [Persona::Client, Persona::Staff, Persona::Provider]
    .into_iter()
    .filter(|p| policy.admits(*p) && account.subject.holds(*p))
    .collect();

  if held.iter().any(|p| account.can_act_as(*p)) {
    return Ok(());
  }
  match held.first() {
    Some(&p) => check_persona(account, p),
    None => deny("subject holds no persona accepted by login route"),
  }
}
