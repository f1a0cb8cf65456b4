use anyhow::{Context, Error};
use log::{error, info};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time;
use tokio_postgres::{Client, NoTls};

const ACQUIRE_TIMEOUT_MILLIS: u64 = 3000;
pub(crate) const DEFAULT_SIZE: usize = 10;

/// Fixed-size connection pool, accessed in a FIFO manner. Generic over the
/// connection type so tests run without a live database.
pub(crate) struct Pool<C: Send + 'static>(Arc<Shared<C>>);

struct Shared<C> {
    connections: Mutex<VecDeque<C>>,
}

impl<C: Send + 'static> Clone for Pool<C> {
    fn clone(&self) -> Pool<C> {
        Pool(self.0.clone())
    }
}

impl<C: Send + 'static> Pool<C> {
    pub fn new() -> Self {
        Self(Arc::new(Shared {
            connections: Mutex::new(VecDeque::with_capacity(DEFAULT_SIZE)),
        }))
    }

    pub async fn add(&self, client: C) {
        self.0.connections.lock().await.push_back(client);
    }

    /// Take a connection; `None` when the pool is drained or the lock could
    /// not be taken in time. The connection returns to the pool on drop.
    pub async fn acquire(&self) -> Option<PooledConnection<C>> {
        let sleep = time::sleep(Duration::from_millis(ACQUIRE_TIMEOUT_MILLIS));
        tokio::pin!(sleep);
        tokio::select! {
            mut connections = self.0.connections.lock() => {
                connections.pop_front().map(|client| PooledConnection {
                    client: Some(client),
                    pool: self.clone(),
                })
            },
            _ = &mut sleep => {
                error!("timed out acquiring a connection after {} ms", ACQUIRE_TIMEOUT_MILLIS);
                None
            },
        }
    }
}

pub(crate) struct PooledConnection<C: Send + 'static> {
    client: Option<C>,
    pool: Pool<C>,
}

impl<C: Send + 'static> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.client.as_ref().expect("connection already released")
    }
}

impl<C: Send + 'static> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.client.as_mut().expect("connection already released")
    }
}

impl<C: Send + 'static> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        // uncontended fast path keeps release synchronous
        match self.pool.0.connections.try_lock() {
            Ok(mut connections) => connections.push_back(client),
            Err(_) => {
                let pool = self.pool.clone();
                tokio::spawn(async move {
                    pool.0.connections.lock().await.push_back(client);
                });
            }
        }
    }
}

/// Open `size` connections up front and spawn their drivers; startup aborts
/// if any of them cannot be established.
pub(crate) async fn connect(conn_str: &str, size: usize) -> Result<Pool<Client>, Error> {
    let pool = Pool::new();
    let mut set = JoinSet::new();
    for _ in 0..size {
        let conn_str = conn_str.to_string();
        set.spawn(async move {
            let (client, conn) = tokio_postgres::connect(conn_str.as_str(), NoTls)
                .await
                .context("failed to create connection")?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    error!("connection returned error and aborted, {}", e);
                }
            });
            Ok::<Client, Error>(client)
        });
    }
    while let Some(res) = set.join_next().await {
        let client = res.context("join_next failed when joining")??;
        info!("connection created");
        pool.add(client).await;
    }
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct FakeConn(u8);

    #[tokio::test]
    async fn empty_pool_yields_none() {
        let pool = Pool::<FakeConn>::new();
        assert!(pool.acquire().await.is_none());
    }

    #[tokio::test]
    async fn acquire_and_release() {
        let pool = Pool::new();
        pool.add(FakeConn(1)).await;
        {
            let conn = match pool.acquire().await {
                Some(conn) => conn,
                None => panic!("should get some"),
            };
            assert_eq!(*conn, FakeConn(1));
            assert!(pool.acquire().await.is_none());
        } // conn drops here, and is released automatically

        assert!(pool.acquire().await.is_some());
        assert!(pool.acquire().await.is_some());
    }

    #[tokio::test]
    async fn fifo_order() {
        let pool = Pool::new();
        pool.add(FakeConn(1)).await;
        pool.add(FakeConn(2)).await;
        let first = pool.acquire().await.unwrap();
        assert_eq!(*first, FakeConn(1));
        drop(first);
        // released connection goes to the back
        assert_eq!(*pool.acquire().await.unwrap(), FakeConn(2));
    }
}
