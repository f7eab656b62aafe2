//! Synchronous paths: blocking certificate resolution and single-flight from
//! plain threads.

use idp_client::assertion::AssertionBuilder;
use idp_client::cache::{Cache, SingleFlightStore};
use idp_client::crypto::SigningAlgorithm;
use idp_client::errors::IdpError;
use idp_client::vault::KeyVault;
use idp_test_utils::{
    cached_vault, certificate_backend, test_cache, test_certificate, test_client_settings,
    AssertionChecks, TEST_CERTIFICATE_NAME, TEST_CLIENT_ID,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::time::Duration;

#[test]
fn test_blocking_assertion_uses_cache() -> Result<(), anyhow::Error> {
    let backend = certificate_backend();
    let cache = test_cache();
    let vault = cached_vault(backend.clone(), cache.clone());
    let builder = AssertionBuilder::new(&test_client_settings("https://idp.example.com"), vault)?;

    for _ in 0..3 {
        builder
            .build_signed_assertion_blocking()?
            .assert_client(TEST_CLIENT_ID)
            .assert_signed_by(&test_certificate(), SigningAlgorithm::Rs512);
    }

    assert_eq!(backend.fetch_count(), 1);
    assert!(cache.get_value_blocking(TEST_CERTIFICATE_NAME).is_ok());
    Ok(())
}

#[test]
fn test_blocking_certificate_fetch() -> Result<(), anyhow::Error> {
    let backend = certificate_backend();
    let vault = cached_vault(backend.clone(), test_cache());

    let certificate = vault.obtain_certificate(TEST_CERTIFICATE_NAME)?;
    assert_eq!(certificate.public_key_der(), test_certificate().public_key_der());

    let missing = vault.obtain_certificate("missing-cert");
    assert!(matches!(missing, Err(IdpError::Remote(_))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_async_and_blocking_paths_share_cache() -> Result<(), anyhow::Error> {
    let backend = certificate_backend();
    let vault = cached_vault(backend.clone(), test_cache());

    vault.obtain_certificate_async(TEST_CERTIFICATE_NAME).await?;

    let worker = vault.clone();
    let certificate =
        tokio::task::spawn_blocking(move || worker.obtain_certificate(TEST_CERTIFICATE_NAME))
            .await??;

    assert_eq!(certificate.modulus_bits(), 2048);
    assert_eq!(backend.fetch_count(), 1);
    Ok(())
}

#[test]
fn test_blocking_single_flight_across_threads() {
    let store: SingleFlightStore<String, String> = SingleFlightStore::new();
    let runs = AtomicUsize::new(0);
    let barrier = Barrier::new(4);

    let results: Vec<Result<String, IdpError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    store.get_or_create_blocking("shared".to_string(), None, || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(50));
                        Ok("value".to_string())
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect()
    });

    assert!(results.iter().all(|r| r.as_deref().ok() == Some("value")));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(store.lock_count(), 0);
}
