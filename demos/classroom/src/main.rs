//! One simulated 50-minute class.
//!
//! A manual clock stands in for the wall clock so the whole class runs in
//! milliseconds. Each rotation is triggered by hand at the moment the
//! scheduler would have fired; everything else goes through the same
//! calls a real deployment makes.
//!
//! ```text
//! RUST_LOG=debug cargo run -p classroom
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use rollcall::prelude::*;
use tracing::info;

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

struct Attendee {
    id: StudentId,
    name: &'static str,
    reference: Option<&'static str>,
    /// How many of the class's rotation slots this student caught.
    slots: i64,
    /// Biometric payload presented at check-out, if they checked out.
    checkout: Option<&'static str>,
}

const ROSTER: [Attendee; 5] = [
    Attendee {
        id: StudentId(1),
        name: "Ada",
        reference: Some("face-ada"),
        slots: 10,
        checkout: Some("face-ada"),
    },
    Attendee {
        id: StudentId(2),
        name: "Bob",
        reference: Some("face-bob"),
        slots: 6,
        checkout: Some("face-bob"),
    },
    Attendee {
        id: StudentId(3),
        name: "Cy",
        reference: Some("face-cy"),
        slots: 10,
        checkout: Some("face-ada"),
    },
    Attendee {
        id: StudentId(4),
        name: "Dee",
        reference: None,
        slots: 3,
        checkout: Some("scan"),
    },
    Attendee {
        id: StudentId(5),
        name: "Eve",
        reference: Some("face-eve"),
        slots: 8,
        checkout: None,
    },
];

const CLASS_MINUTES: i64 = 50;

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

async fn simulate(
    rollcall: &Rollcall<MemoryStore>,
    clock: &ManualClock,
) -> Result<SessionId, RollcallError> {
    for attendee in &ROSTER {
        rollcall
            .store()
            .insert_student(Student {
                id: attendee.id,
                name: attendee.name.into(),
                biometric_reference: attendee.reference.map(String::from),
            })
            .await?;
    }

    let start = clock.now();
    let session = rollcall
        .open(
            OwnerId(1),
            SessionMetadata {
                course_name: "Systems Programming".into(),
                classroom_location: Some("B-204".into()),
            },
        )
        .await?;

    let interval = Duration::from_std(rollcall.config().tokens.rotation_interval)
        .unwrap_or(Duration::minutes(5));
    let slots = (Duration::minutes(CLASS_MINUTES).num_seconds() / interval.num_seconds()).max(1);

    for slot in 0..slots {
        if slot > 0 {
            clock.set(start + interval * slot as i32);
            rollcall.issuer().issue(session.id).await?;
        }
        let token = rollcall.current_token(session.id).await?;

        for attendee in ROSTER.iter().filter(|a| slot < a.slots) {
            rollcall
                .submit(TokenSubmission {
                    session_id: session.id,
                    student_id: attendee.id,
                    token_value: token.value.clone(),
                    submitted_at: token.created_at + Duration::seconds(30),
                    signal: Some(-55 - slot as i32),
                    biometric: None,
                })
                .await?;
        }
    }

    clock.set(start + Duration::minutes(CLASS_MINUTES));
    rollcall.close(session.id).await?;

    for attendee in &ROSTER {
        if let Some(payload) = attendee.checkout {
            rollcall.check_out(session.id, attendee.id, payload).await?;
        }
    }
    Ok(session.id)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rollcall::telemetry::init_tracing();

    let clock = ManualClock::new(Utc::now());
    let rollcall = RollcallBuilder::new()
        .config(RollcallConfig::from_env())
        .clock(Arc::new(clock.clone()))
        .build(Arc::new(MemoryStore::new()));

    let session_id = simulate(&rollcall, &clock).await?;

    for entry in rollcall.attendance_report(session_id).await? {
        info!(
            student = %entry.student_id,
            name = entry.student_name.as_deref().unwrap_or("?"),
            tokens = entry.token_count,
            verified = entry.biometric_verified,
            status = %entry.status,
            "attendance"
        );
    }

    let json = rollcall.encode_report(session_id, &JsonCodec).await?;
    println!("{}", String::from_utf8_lossy(&json));

    rollcall.shutdown().await;
    Ok(())
}
