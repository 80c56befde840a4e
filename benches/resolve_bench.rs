//! Quick benchmark of payload expression resolution

use std::time::Instant;

use task_agent::{Resolver, Secret};

fn main() {
    let secrets = vec![
        Secret::new("sid", "mySecretValue"),
        Secret::new("token", "ghp_0123456789abcdef"),
        Secret::new("cert", "-----BEGIN CERT-----\nMIIB\n-----END CERT-----"),
    ];

    let payloads = vec![
        r#"{"plain": "no expressions at all", "n": [1, 2, 3]}"#.to_string(),
        r#"{"user": "${{secrets.sid}}", "pass": "${{secrets.token}}"}"#.to_string(),
        r#"{"auth": "Basic <{ .secrets.sid | getAsBase64 }>"}"#.to_string(),
        r#"{"nested": "<{ a <{ <{ .secrets.token | getAsBase64 }> | getAsBase64 }> | getAsBase64 }>"}"#
            .to_string(),
        format!(
            "{{\"many\": [{}]}}",
            (0..50)
                .map(|i| format!("\"<{{ item-{i} | getAsBase64 }}>\""))
                .collect::<Vec<_>>()
                .join(",")
        ),
    ];

    println!("Expression Resolution Performance Test");
    println!("======================================\n");

    let resolver = Resolver::new(&secrets);

    // Warm up
    for payload in &payloads {
        let _ = resolver.resolve(payload.as_bytes());
    }

    for payload in &payloads {
        let iterations = 10_000;
        let start = Instant::now();

        for _ in 0..iterations {
            let _ = resolver.resolve(payload.as_bytes());
        }

        let elapsed = start.elapsed();
        let per_op = elapsed / iterations;

        let label: String = payload.chars().take(60).collect();
        println!("Payload: {:64}", format!("'{}'", label));
        println!("  Time for {} iterations: {:?}", iterations, elapsed);
        println!("  Per operation: {:?}\n", per_op);
    }
}
