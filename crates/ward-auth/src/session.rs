//! Token issuance, refresh and revocation.

use chrono::{DateTime, Utc};
use ward_core::{
  audit::{LoginEvent, LoginEventKind, LoginOutcome},
  persona::Persona,
  store::{CredentialStore, TokenBlacklist},
  subject::{Account, SubjectId},
  token::{TokenKind, TokenPair},
};

use crate::{AuthError, Result, engine::AuthContext, token::TokenCodec};

pub struct SessionManager<'a, S> {
  store: &'a S,
  codec: &'a TokenCodec,
}

impl<'a, S> SessionManager<'a, S>
where
  S: CredentialStore + TokenBlacklist,
{
  pub fn new(store: &'a S, codec: &'a TokenCodec) -> Self { Self { store, codec } }

  /// Mint a token pair for an account that has just passed password login.
  pub async fn open(&self, account: &Account, persona: Persona) -> Result<TokenPair> {
    if !account.can_act_as(persona) {
      if account.subject.holds(persona) {
        return Err(AuthError::Blocked {
          reason: account.credential.block_reason(persona).map(str::to_owned),
        });
      }
      return Err(AuthError::Unauthorized);
    }

    let id = account.subject.id;
    let pair = self.codec.issue_pair(id, persona)?;
    self
      .store
      .set_refresh_token(id, Some(pair.refresh_token.clone()))
      .await
      .map_err(AuthError::store)?;
    tracing::info!(subject = %id, %persona, "issued token pair");
    Ok(pair)
  }

  /// Exchange a refresh token for a new pair. The presented token is
  /// blacklisted before the new pair is minted, so of several concurrent
  /// exchanges of one token only the first succeeds.
  pub async fn refresh(&self, refresh_token: &str, user_agent: Option<&str>) -> Result<TokenPair> {
    let claims = match self.codec.decode(refresh_token) {
      Ok(c) => c,
      Err(e) => {
        self.record(None, LoginOutcome::Failure, user_agent).await?;
        return Err(e);
      }
    };
    let id = claims.subject_id;

    let outcome = match self.check_refresh(refresh_token, claims.kind, id, claims.persona).await {
      Ok(()) => self.spend(refresh_token, claims.expires_at()).await,
      Err(e) => Err(e),
    };
    if let Err(e) = outcome {
      if !matches!(e, AuthError::Store(_)) {
        tracing::warn!(subject = %id, error = %e, "refresh refused");
        self.record(Some(id), LoginOutcome::Failure, user_agent).await?;
      }
      return Err(e);
    }

    let pair = self.codec.issue_pair(id, claims.persona)?;
    self
      .store
      .set_refresh_token(id, Some(pair.refresh_token.clone()))
      .await
      .map_err(AuthError::store)?;
    self.record(Some(id), LoginOutcome::Success, user_agent).await?;

    tracing::info!(subject = %id, persona = %claims.persona, "refreshed token pair");
    Ok(pair)
  }

  async fn check_refresh(
    &self,
    token: &str,
    kind: TokenKind,
    id: SubjectId,
    persona: Persona,
  ) -> Result<()> {
    if kind != TokenKind::Refresh {
      return Err(AuthError::Unauthorized);
    }
    if self
      .store
      .is_revoked(token)
      .await
      .map_err(AuthError::store)?
    {
      return Err(AuthError::Unauthorized);
    }

    let account = self
      .store
      .get_account(id)
      .await
      .map_err(AuthError::store)?
      .ok_or(AuthError::Unauthorized)?;
    if account.subject.deleted || !account.subject.holds(persona) {
      return Err(AuthError::Unauthorized);
    }
    if account.credential.is_blocked(persona) {
      return Err(AuthError::Blocked {
        reason: account.credential.block_reason(persona).map(str::to_owned),
      });
    }
    Ok(())
  }

  /// Blacklist a refresh token; fails if someone else already spent it.
  async fn spend(&self, token: &str, expires_at: DateTime<Utc>) -> Result<()> {
    if self
      .store
      .revoke(token, expires_at)
      .await
      .map_err(AuthError::store)?
    {
      Ok(())
    } else {
      Err(AuthError::Unauthorized)
    }
  }

  /// Blacklist the caller's access token and their current refresh token.
  pub async fn close(&self, ctx: &AuthContext) -> Result<()> {
    let id = ctx.subject_id();

    if let Some(bearer) = &ctx.bearer {
      self
        .store
        .revoke(&bearer.token, bearer.claims.expires_at())
        .await
        .map_err(AuthError::store)?;
    }

    let current = self
      .store
      .get_account(id)
      .await
      .map_err(AuthError::store)?
      .and_then(|a| a.credential.refresh_token);
    if let Some(refresh) = current {
      let expires_at = self
        .codec
        .decode(&refresh)
        .map(|c| c.expires_at())
        .unwrap_or_else(|_| Utc::now() + self.codec.lifetime(TokenKind::Refresh));
      self
        .store
        .revoke(&refresh, expires_at)
        .await
        .map_err(AuthError::store)?;
    }
    self
      .store
      .set_refresh_token(id, None)
      .await
      .map_err(AuthError::store)?;

    tracing::info!(subject = %id, persona = ?ctx.persona(), "logged out");
    Ok(())
  }

  async fn record(
    &self,
    subject_id: Option<SubjectId>,
    outcome: LoginOutcome,
    user_agent: Option<&str>,
  ) -> Result<()> {
    self
      .store
      .append_login_event(LoginEvent::new(
        subject_id,
        LoginEventKind::Refresh,
        outcome,
        user_agent,
      ))
      .await
      .map_err(AuthError::store)
  }
}
