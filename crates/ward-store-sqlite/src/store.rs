//! [`SqliteStore`], the SQLite implementation of every Ward storage trait.

use std::{collections::BTreeSet, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use ward_core::{
  audit::LoginEvent,
  grant::{GrantStatus, ResourceGrant},
  persona::BlockScope,
  resource::Resource,
  role::Role,
  store::{Backend, CredentialStore, GrantStore, RoleStore, TokenBlacklist},
  subject::{Account, NewSubject, Subject, SubjectId},
};

use crate::{
  Error, Result,
  encode::{
    ACCOUNT_COLUMNS, GRANT_COLUMNS, RawAccount, RawGrant, RawLoginEvent, encode_dt,
    encode_uuid, token_digest,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Ward store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Load one account with `where_clause` bound to a single parameter.
  async fn account_where(
    &self,
    where_clause: &'static str,
    param: rusqlite::types::Value,
  ) -> Result<Option<Account>> {
    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {ACCOUNT_COLUMNS}
           FROM subjects s
           JOIN credentials c ON c.subject_id = s.subject_id
           WHERE {where_clause}"
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![param], RawAccount::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  /// Run an `UPDATE` whose last parameter is the subject id; fails if `id`
  /// matched nothing.
  async fn update_subject_row(
    &self,
    id: SubjectId,
    sql: &'static str,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<()> {
    let changed = self
      .conn
      .call(move |conn| {
        let mut all = params;
        all.push(rusqlite::types::Value::Integer(id.0));
        Ok(conn.execute(sql, rusqlite::params_from_iter(all))?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::SubjectNotFound(id));
    }
    Ok(())
  }

  async fn grants_where(
    &self,
    column: &'static str,
    id: SubjectId,
  ) -> Result<Vec<ResourceGrant>> {
    let raws: Vec<RawGrant> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {GRANT_COLUMNS} FROM resource_grants
           WHERE {column} = ?1
           ORDER BY created_at, resource"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id.0], RawGrant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGrant::into_grant).collect()
  }
}

fn text(value: Option<String>) -> rusqlite::types::Value {
  value.map_or(rusqlite::types::Value::Null, rusqlite::types::Value::Text)
}

impl Backend for SqliteStore {
  type Error = Error;
}

// ─── CredentialStore impl ────────────────────────────────────────────────────

impl CredentialStore for SqliteStore {
  async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    let email      = input.email.trim().to_lowercase();
    let created_at = Utc::now();
    let at_str     = encode_dt(created_at);
    let email_c    = email.clone();

    let inserted: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let taken: bool = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE email = ?1",
            rusqlite::params![email_c],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO subjects (
             email, is_client, is_staff, is_provider, is_internal,
             email_verified, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            email_c,
            input.is_client,
            input.is_staff,
            input.is_provider,
            input.is_internal,
            input.email_verified,
            at_str,
          ],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
          "INSERT INTO credentials (subject_id, password_hash) VALUES (?1, ?2)",
          rusqlite::params![id, input.password_hash],
        )?;
        tx.commit()?;
        Ok(Some(id))
      })
      .await?;

    let id = inserted.ok_or_else(|| Error::DuplicateEmail(email.clone()))?;

    Ok(Subject {
      id:             SubjectId(id),
      email,
      is_client:      input.is_client,
      is_staff:       input.is_staff,
      is_provider:    input.is_provider,
      is_internal:    input.is_internal,
      deleted:        false,
      email_verified: input.email_verified,
      created_at,
    })
  }

  async fn get_account(&self, id: SubjectId) -> Result<Option<Account>> {
    self
      .account_where("s.subject_id = ?1", rusqlite::types::Value::Integer(id.0))
      .await
  }

  async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
    self
      .account_where("s.email = ?1", rusqlite::types::Value::Text(email.to_owned()))
      .await
  }

  async fn set_last_login(&self, id: SubjectId, at: DateTime<Utc>) -> Result<()> {
    self
      .update_subject_row(
        id,
        "UPDATE credentials SET last_login = ?1 WHERE subject_id = ?2",
        vec![rusqlite::types::Value::Text(encode_dt(at))],
      )
      .await
  }

  async fn set_refresh_token(&self, id: SubjectId, token: Option<String>) -> Result<()> {
    self
      .update_subject_row(
        id,
        "UPDATE credentials SET refresh_token = ?1 WHERE subject_id = ?2",
        vec![text(token)],
      )
      .await
  }

  async fn set_password_hash(&self, id: SubjectId, hash: String) -> Result<()> {
    self
      .update_subject_row(
        id,
        "UPDATE credentials SET password_hash = ?1 WHERE subject_id = ?2",
        vec![rusqlite::types::Value::Text(hash)],
      )
      .await
  }

  async fn block(
    &self,
    id: SubjectId,
    scope: BlockScope,
    reason: Option<String>,
  ) -> Result<()> {
    let sql = match scope {
      BlockScope::Staff => {
        "UPDATE credentials SET staff_blocked = 1, staff_block_reason = ?1
         WHERE subject_id = ?2"
      }
      BlockScope::Client => {
        "UPDATE credentials SET client_blocked = 1, client_block_reason = ?1
         WHERE subject_id = ?2"
      }
    };
    self.update_subject_row(id, sql, vec![text(reason)]).await
  }

  async fn unblock(&self, id: SubjectId, scope: BlockScope) -> Result<()> {
    let sql = match scope {
      BlockScope::Staff => {
        "UPDATE credentials SET staff_blocked = 0, staff_block_reason = NULL
         WHERE subject_id = ?1"
      }
      BlockScope::Client => {
        "UPDATE credentials SET client_blocked = 0, client_block_reason = NULL
         WHERE subject_id = ?1"
      }
    };
    self.update_subject_row(id, sql, vec![]).await
  }

  async fn mark_deleted(&self, id: SubjectId) -> Result<()> {
    // The scrubbed email keeps the UNIQUE constraint satisfied.
    let scrubbed = format!("deleted-{id}@invalid");

    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE subjects
           SET deleted = 1, is_client = 0, is_staff = 0, is_provider = 0,
               is_internal = 0, email = ?1
           WHERE subject_id = ?2",
          rusqlite::params![scrubbed, id.0],
        )?;
        if changed == 0 {
          return Ok(false);
        }
        tx.execute(
          "UPDATE credentials SET refresh_token = NULL WHERE subject_id = ?1",
          rusqlite::params![id.0],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !found {
      return Err(Error::SubjectNotFound(id));
    }
    Ok(())
  }

  async fn append_login_event(&self, event: LoginEvent) -> Result<()> {
    let subject_id = event.subject_id.map(|id| id.0);
    let kind       = event.kind.as_ref().to_owned();
    let outcome    = event.outcome.as_ref().to_owned();
    let at_str     = encode_dt(event.recorded_at);
    let user_agent = event.user_agent;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO login_events (subject_id, kind, outcome, user_agent, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![subject_id, kind, outcome, user_agent, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn login_events(
    &self,
    subject: Option<SubjectId>,
    limit: usize,
  ) -> Result<Vec<LoginEvent>> {
    let subject_id = subject.map(|id| id.0);
    let limit_val  = limit as i64;

    let raws: Vec<RawLoginEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT subject_id, kind, outcome, user_agent, recorded_at
           FROM login_events
           WHERE ?1 IS NULL OR subject_id = ?1
           ORDER BY event_id DESC
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id, limit_val], |row| {
            Ok(RawLoginEvent {
              subject_id:  row.get(0)?,
              kind:        row.get(1)?,
              outcome:     row.get(2)?,
              user_agent:  row.get(3)?,
              recorded_at: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLoginEvent::into_event).collect()
  }
}

// ─── RoleStore impl ──────────────────────────────────────────────────────────

impl RoleStore for SqliteStore {
  async fn roles_for(&self, id: SubjectId) -> Result<BTreeSet<Role>> {
    let names: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT role FROM role_assignments WHERE subject_id = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![id.0], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    names
      .iter()
      .map(|n| Role::parse(n).map_err(Error::from))
      .collect()
  }

  async fn assign_role(&self, id: SubjectId, role: Role) -> Result<()> {
    let role_str = role.as_ref().to_owned();

    let exists = self
      .conn
      .call(move |conn| {
        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            rusqlite::params![id.0],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if exists {
          conn.execute(
            "INSERT OR IGNORE INTO role_assignments (subject_id, role) VALUES (?1, ?2)",
            rusqlite::params![id.0, role_str],
          )?;
        }
        Ok(exists)
      })
      .await?;

    if !exists {
      return Err(Error::SubjectNotFound(id));
    }
    Ok(())
  }

  async fn revoke_role(&self, id: SubjectId, role: Role) -> Result<bool> {
    let role_str = role.as_ref().to_owned();

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM role_assignments WHERE subject_id = ?1 AND role = ?2",
          rusqlite::params![id.0, role_str],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }
}

// ─── GrantStore impl ─────────────────────────────────────────────────────────

impl GrantStore for SqliteStore {
  async fn find_grant(
    &self,
    granter:  SubjectId,
    delegate: SubjectId,
    resource: Resource,
  ) -> Result<Option<ResourceGrant>> {
    let resource_str = resource.as_ref().to_owned();

    let raw: Option<RawGrant> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {GRANT_COLUMNS} FROM resource_grants
           WHERE granter_id = ?1 AND delegate_id = ?2 AND resource = ?3"
        );
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params![granter.0, delegate.0, resource_str],
              RawGrant::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGrant::into_grant).transpose()
  }

  async fn get_grant(&self, grant_id: Uuid) -> Result<Option<ResourceGrant>> {
    let id_str = encode_uuid(grant_id);

    let raw: Option<RawGrant> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {GRANT_COLUMNS} FROM resource_grants WHERE grant_id = ?1");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawGrant::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGrant::into_grant).transpose()
  }

  async fn insert_grant(&self, grant: ResourceGrant) -> Result<()> {
    let id_str       = encode_uuid(grant.grant_id);
    let resource_str = grant.resource.as_ref().to_owned();
    let status_str   = grant.status.as_ref().to_owned();
    let at_str       = encode_dt(grant.created_at);
    let granter      = grant.granter;
    let delegate     = grant.delegate;

    enum Outcome {
      Inserted,
      Duplicate,
      MissingSubject(SubjectId),
    }

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for id in [granter, delegate] {
          let exists: bool = tx
            .query_row(
              "SELECT 1 FROM subjects WHERE subject_id = ?1",
              rusqlite::params![id.0],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          if !exists {
            return Ok(Outcome::MissingSubject(id));
          }
        }

        let duplicate: bool = tx
          .query_row(
            "SELECT 1 FROM resource_grants
             WHERE granter_id = ?1 AND delegate_id = ?2 AND resource = ?3",
            rusqlite::params![granter.0, delegate.0, resource_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if duplicate {
          return Ok(Outcome::Duplicate);
        }

        tx.execute(
          "INSERT INTO resource_grants (
             grant_id, granter_id, delegate_id, resource, status, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, granter.0, delegate.0, resource_str, status_str, at_str],
        )?;
        tx.commit()?;
        Ok(Outcome::Inserted)
      })
      .await?;

    match outcome {
      Outcome::Inserted => Ok(()),
      Outcome::Duplicate => Err(Error::DuplicateGrant),
      Outcome::MissingSubject(id) => Err(Error::SubjectNotFound(id)),
    }
  }

  async fn set_grant_status(&self, grant_id: Uuid, status: GrantStatus) -> Result<bool> {
    let id_str     = encode_uuid(grant_id);
    let status_str = status.as_ref().to_owned();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE resource_grants SET status = ?1 WHERE grant_id = ?2",
          rusqlite::params![status_str, id_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn delete_grant(&self, grant_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(grant_id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM resource_grants WHERE grant_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn grants_by_granter(&self, granter: SubjectId) -> Result<Vec<ResourceGrant>> {
    self.grants_where("granter_id", granter).await
  }

  async fn grants_by_delegate(&self, delegate: SubjectId) -> Result<Vec<ResourceGrant>> {
    self.grants_where("delegate_id", delegate).await
  }
}

// ─── TokenBlacklist impl ─────────────────────────────────────────────────────

impl TokenBlacklist for SqliteStore {
  async fn is_revoked(&self, token: &str) -> Result<bool> {
    let digest = token_digest(token);

    let revoked = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM token_blacklist WHERE token_digest = ?1",
              rusqlite::params![digest],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(revoked)
  }

  async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool> {
    let digest     = token_digest(token);
    let expires    = expires_at.timestamp();
    let revoked_at = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO token_blacklist (token_digest, expires_at, revoked_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![digest, expires, revoked_at],
        )?)
      })
      .await?;
    Ok(inserted == 1)
  }

  async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
    let cutoff = now.timestamp();

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM token_blacklist WHERE expires_at < ?1",
          rusqlite::params![cutoff],
        )?)
      })
      .await?;

    tracing::debug!(removed, "purged expired blacklist entries");
    Ok(removed as u64)
  }
}
