//! Semaphore-capped fan-out of one probe over a batch of hostnames.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Run `probe` over every hostname with at most `cap` in flight, and collect
/// results keyed by hostname. Barrier semantics: returns only after every
/// submitted unit has resolved. A task that panics simply drops out of the
/// map, which downstream treats as "no data" for that hostname.
///
/// Results are collected as tasks complete; there is no ordering guarantee
/// between hostnames.
pub async fn fan_out<T, F, Fut>(hosts: Vec<String>, cap: usize, probe: F) -> HashMap<String, T>
where
    T: Send + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(cap.max(1)));
    let mut handles = Vec::with_capacity(hosts.len());
    for host in hosts {
        let permit = sem.clone().acquire_owned().await.unwrap();
        let fut = probe(host.clone());
        handles.push(tokio::spawn(async move {
            let out = fut.await;
            drop(permit);
            (host, out)
        }));
    }
    let mut results = HashMap::new();
    for h in handles {
        if let Ok((host, out)) = h.await {
            results.insert(host, out);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn all_results_present_and_attached_to_the_right_host() {
        let hosts: Vec<String> = (0..50).map(|i| format!("h{}.example.com", i)).collect();
        let results = fan_out(hosts.clone(), 20, |host| async move {
            let ms = rand::thread_rng().gen_range(1..20);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            format!("probed:{}", host)
        })
        .await;
        assert_eq!(results.len(), 50);
        for host in hosts {
            assert_eq!(results[&host], format!("probed:{}", host));
        }
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_cap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let hosts: Vec<String> = (0..40).map(|i| format!("h{}", i)).collect();
        let (fl, pk) = (in_flight.clone(), peak.clone());
        let results = fan_out(hosts, 8, move |host| {
            let (fl, pk) = (fl.clone(), pk.clone());
            async move {
                let now = fl.fetch_add(1, Ordering::SeqCst) + 1;
                pk.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                fl.fetch_sub(1, Ordering::SeqCst);
                host
            }
        })
        .await;
        assert_eq!(results.len(), 40);
        assert!(peak.load(Ordering::SeqCst) <= 8);
    }

    #[tokio::test]
    async fn a_panicking_probe_drops_only_its_own_result() {
        let hosts = vec!["ok.example.com".to_string(), "boom.example.com".to_string()];
        let results = fan_out(hosts, 4, |host| async move {
            if host.starts_with("boom") {
                panic!("injected");
            }
            host
        })
        .await;
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("ok.example.com"));
    }
}
