use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use serde_json::json;

use crate::remote::{RemoteStore, Table};
use crate::session::{Session, resolve_user};
use crate::settings::Settings;
use crate::state::{
    AdminSnapshot, Cadet, CadetScores, Delta, Mutation, NewsItem, ProviderCommand, Task,
};

#[derive(Debug, Clone)]
pub struct RatingLoad {
    pub cadets: Vec<Cadet>,
    pub score_failures: usize,
}

pub fn spawn_provider(
    store: Arc<dyn RemoteStore>,
    settings: Settings,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let pool = build_fetch_pool(settings.fetch_parallelism);
        if pool.is_none() {
            let _ = tx.send(Delta::Log(
                "[WARN] Fetch pool unavailable; score lookups run sequentially".to_string(),
            ));
        }

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                ProviderCommand::LoadRating => send_rating(store.as_ref(), &pool, &tx),
                ProviderCommand::LoadBoard => send_board(store.as_ref(), &tx),
                ProviderCommand::LoadAdmin => send_admin(store.as_ref(), &tx),
                ProviderCommand::SignIn { email, password } => {
                    match sign_in(store.as_ref(), &email, &password, &settings.admin_email) {
                        Ok(session) => {
                            let _ = tx.send(Delta::SignedIn(session));
                        }
                        Err(err) => {
                            let _ = tx.send(Delta::SignInFailed(format!("{err:#}")));
                        }
                    }
                }
                ProviderCommand::RestoreSession(saved) => {
                    match restore_session(store.as_ref(), saved, &settings.admin_email) {
                        Ok(session) => {
                            let _ = tx.send(Delta::SignedIn(session));
                        }
                        Err(err) => {
                            let _ = tx.send(Delta::SessionRestoreFailed(format!("{err:#}")));
                        }
                    }
                }
                ProviderCommand::SignOut { access_token } => {
                    if let Err(err) = store.sign_out(&access_token) {
                        let _ = tx.send(Delta::Log(format!("[WARN] Sign-out request: {err:#}")));
                    }
                    let _ = tx.send(Delta::SignedOut);
                }
                ProviderCommand::Mutate(mutation) => {
                    let label = mutation.label();
                    let touches_board = matches!(
                        mutation,
                        Mutation::CreateTask(_)
                            | Mutation::UpdateTask { .. }
                            | Mutation::DeleteTask { .. }
                            | Mutation::CreateNews(_)
                            | Mutation::UpdateNews { .. }
                            | Mutation::DeleteNews { .. }
                    );
                    match apply_mutation(store.as_ref(), mutation) {
                        Ok(()) => {
                            let _ = tx.send(Delta::MutationApplied(label.to_string()));
                            send_admin(store.as_ref(), &tx);
                            send_rating(store.as_ref(), &pool, &tx);
                            if touches_board {
                                send_board(store.as_ref(), &tx);
                            }
                        }
                        Err(err) => {
                            let _ = tx.send(Delta::MutationFailed(format!("{label} failed: {err:#}")));
                        }
                    }
                }
            }
        }
    })
}

fn send_rating(store: &dyn RemoteStore, pool: &Option<rayon::ThreadPool>, tx: &Sender<Delta>) {
    let started = Instant::now();
    match load_rating(store, pool) {
        Ok(load) => {
            let _ = tx.send(Delta::Log(format!(
                "[INFO] Rating fetched in {} ms",
                started.elapsed().as_millis()
            )));
            let _ = tx.send(Delta::RatingLoaded {
                cadets: load.cadets,
                score_failures: load.score_failures,
            });
        }
        Err(err) => {
            let _ = tx.send(Delta::RatingLoadFailed(format!("{err:#}")));
        }
    }
}

fn send_board(store: &dyn RemoteStore, tx: &Sender<Delta>) {
    match load_board(store) {
        Ok((news, tasks)) => {
            let _ = tx.send(Delta::BoardLoaded { news, tasks });
        }
        Err(err) => {
            let _ = tx.send(Delta::BoardLoadFailed(format!("{err:#}")));
        }
    }
}

fn send_admin(store: &dyn RemoteStore, tx: &Sender<Delta>) {
    match load_admin(store) {
        Ok(snapshot) => {
            let _ = tx.send(Delta::AdminLoaded(snapshot));
        }
        Err(err) => {
            let _ = tx.send(Delta::AdminLoadFailed(format!("{err:#}")));
        }
    }
}

/// Lists cadets, then fetches every cadet's category scores on the pool.
/// A failed lookup leaves that cadet with zero scores and is counted, not raised.
pub fn load_rating(store: &dyn RemoteStore, pool: &Option<rayon::ThreadPool>) -> Result<RatingLoad> {
    let cadets = store.list_cadets().context("failed to list cadets")?;
    let scored: Vec<(Cadet, bool)> = with_fetch_pool(pool, || {
        cadets
            .into_par_iter()
            .map(|cadet| match store.cadet_scores(&cadet.id) {
                Ok(scores) => (cadet.with_scores(scores), false),
                Err(_) => (cadet.with_scores(CadetScores::default()), true),
            })
            .collect()
    });
    let score_failures = scored.iter().filter(|(_, failed)| *failed).count();
    Ok(RatingLoad {
        cadets: scored.into_iter().map(|(cadet, _)| cadet).collect(),
        score_failures,
    })
}

pub fn load_board(store: &dyn RemoteStore) -> Result<(Vec<NewsItem>, Vec<Task>)> {
    let news = store.list_news().context("failed to list news")?;
    let tasks = store.list_tasks().context("failed to list tasks")?;
    Ok((news, tasks))
}

pub fn load_admin(store: &dyn RemoteStore) -> Result<AdminSnapshot> {
    Ok(AdminSnapshot {
        cadets: store.list_cadets().context("failed to list cadets")?,
        tasks: store.list_tasks().context("failed to list tasks")?,
        news: store.list_news().context("failed to list news")?,
        achievements: store
            .list_achievements()
            .context("failed to list achievements")?,
        history: store
            .list_score_history()
            .context("failed to list score history")?,
    })
}

pub fn sign_in(
    store: &dyn RemoteStore,
    email: &str,
    password: &str,
    admin_email: &str,
) -> Result<Session> {
    let grant = store.sign_in(email, password)?;
    let cadet = store
        .cadet_by_auth_id(&grant.user.id)
        .context("failed to look up cadet profile")?;
    match resolve_user(&grant.user, cadet.as_ref(), admin_email) {
        Some(user) => Ok(Session::from_grant(&grant, user)),
        None => {
            let _ = store.sign_out(&grant.access_token);
            Err(anyhow!(
                "{} is not linked to a cadet or administrator",
                grant.user.email
            ))
        }
    }
}

/// Re-validates a persisted session; the stored profile is refreshed from the store.
pub fn restore_session(store: &dyn RemoteStore, saved: Session, admin_email: &str) -> Result<Session> {
    let identity = store
        .identity(&saved.access_token)
        .context("session token rejected")?;
    let cadet = store
        .cadet_by_auth_id(&identity.id)
        .context("failed to look up cadet profile")?;
    let user = resolve_user(&identity, cadet.as_ref(), admin_email)
        .ok_or_else(|| anyhow!("{} no longer has access", identity.email))?;
    Ok(Session { user, ..saved })
}

pub fn apply_mutation(store: &dyn RemoteStore, mutation: Mutation) -> Result<()> {
    match mutation {
        Mutation::CreateCadet(draft) => {
            let count = store.list_cadets()?.len();
            let row = json!({
                "name": draft.name,
                "email": draft.email,
                "platoon": draft.platoon,
                "squad": draft.squad,
                "total_score": 0,
                "rank": count + 1,
            });
            store.insert(Table::Cadets, &row)
        }
        Mutation::UpdateCadet { id, draft } => {
            store.update(Table::Cadets, &id, &serde_json::to_value(&draft)?)
        }
        Mutation::DeleteCadet { id } => {
            store.delete(Table::Cadets, &id)?;
            rerank(store)
        }
        Mutation::CreateTask(draft) => store.insert(Table::Tasks, &serde_json::to_value(&draft)?),
        Mutation::UpdateTask { id, draft } => {
            store.update(Table::Tasks, &id, &serde_json::to_value(&draft)?)
        }
        Mutation::DeleteTask { id } => store.delete(Table::Tasks, &id),
        Mutation::CreateNews(draft) => store.insert(Table::News, &serde_json::to_value(&draft)?),
        Mutation::UpdateNews { id, draft } => {
            store.update(Table::News, &id, &serde_json::to_value(&draft)?)
        }
        Mutation::DeleteNews { id } => store.delete(Table::News, &id),
        Mutation::CreateAchievement(draft) => {
            store.insert(Table::Achievements, &serde_json::to_value(&draft)?)
        }
        Mutation::UpdateAchievement { id, draft } => {
            store.update(Table::Achievements, &id, &serde_json::to_value(&draft)?)
        }
        Mutation::DeleteAchievement { id } => store.delete(Table::Achievements, &id),
        Mutation::AwardPoints(draft) => {
            let cadet = store
                .list_cadets()?
                .into_iter()
                .find(|c| c.id == draft.cadet_id)
                .ok_or_else(|| anyhow!("cadet {} not found", draft.cadet_id))?;
            store.insert(Table::ScoreHistory, &serde_json::to_value(&draft)?)?;
            store.update(
                Table::Cadets,
                &cadet.id,
                &json!({ "total_score": cadet.total_score + draft.points }),
            )?;
            rerank(store)
        }
    }
}

/// Rewrites ranks from total score; only cadets whose rank moved are updated.
fn rerank(store: &dyn RemoteStore) -> Result<()> {
    let mut cadets = store.list_cadets()?;
    cadets.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    for (idx, cadet) in cadets.iter().enumerate() {
        let rank = idx as u32 + 1;
        if cadet.rank != rank {
            store.update(Table::Cadets, &cadet.id, &json!({ "rank": rank }))?;
        }
    }
    Ok(())
}

pub fn build_fetch_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.clamp(2, 32))
        .thread_name(|idx| format!("score-fetch-{idx}"))
        .build()
        .ok()
}

pub fn with_fetch_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}
