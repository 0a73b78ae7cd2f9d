//! Application state shared across handlers

use common::{cache::RedisPool, token::TokenVerifier};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    booking::BookingService,
    identity::IdentityResolver,
    materials::MaterialService,
    notes::NoteService,
    payments::PaymentGateway,
    repositories::{
        BookingRepository, BookingStore, MaterialRepository, MaterialStore, NoteRepository,
        NoteStore, ReviewRepository, ReviewStore, SessionRepository, SessionStore,
        StatsRepository, StatsStore, UserRepository, UserStore,
    },
    reviews::ReviewService,
    sessions::SessionService,
    stats::StatsService,
    users::UserService,
};

/// Storage backends behind the services
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub materials: Arc<dyn MaterialStore>,
    pub notes: Arc<dyn NoteStore>,
    pub stats: Arc<dyn StatsStore>,
}

impl Stores {
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            sessions: Arc::new(SessionRepository::new(pool.clone())),
            bookings: Arc::new(BookingRepository::new(pool.clone())),
            reviews: Arc::new(ReviewRepository::new(pool.clone())),
            materials: Arc::new(MaterialRepository::new(pool.clone())),
            notes: Arc::new(NoteRepository::new(pool.clone())),
            stats: Arc::new(StatsRepository::new(pool.clone())),
        }
    }
}

#[cfg(test)]
impl Stores {
    /// Every store backed by the same in-memory instance
    pub fn in_memory(store: Arc<crate::repositories::memory::MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            bookings: store.clone(),
            reviews: store.clone(),
            materials: store.clone(),
            notes: store.clone(),
            stats: store,
        }
    }
}

/// Settings the state is built from
pub struct StateOptions {
    pub verifier: TokenVerifier,
    pub identity_cache_ttl: u64,
    pub payments: Arc<dyn PaymentGateway>,
    pub currency: String,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: Option<RedisPool>,
    pub identity: IdentityResolver,
    pub users: UserService,
    pub sessions: SessionService,
    pub bookings: BookingService,
    pub reviews: ReviewService,
    pub materials: MaterialService,
    pub notes: NoteService,
    pub stats: StatsService,
}

impl AppState {
    pub fn new(
        db_pool: PgPool,
        redis_pool: Option<RedisPool>,
        stores: Stores,
        options: StateOptions,
    ) -> Self {
        let identity = IdentityResolver::new(
            options.verifier,
            stores.users.clone(),
            redis_pool.clone(),
            options.identity_cache_ttl,
        );

        Self {
            users: UserService::new(stores.users.clone(), identity.clone()),
            sessions: SessionService::new(stores.sessions.clone(), stores.bookings.clone()),
            bookings: BookingService::new(
                stores.sessions.clone(),
                stores.bookings.clone(),
                options.payments,
                options.currency,
            ),
            reviews: ReviewService::new(stores.reviews.clone(), stores.bookings.clone()),
            materials: MaterialService::new(
                stores.materials.clone(),
                stores.sessions.clone(),
                stores.bookings.clone(),
            ),
            notes: NoteService::new(stores.notes.clone()),
            stats: StatsService::new(stores.stats.clone(), stores.bookings.clone()),
            identity,
            db_pool,
            redis_pool,
        }
    }
}
