use anyhow::Context;
use rusqlite::Connection;

// Migrations are embedded so `init_db(":memory:")` works in tests and the
// binary has no runtime file dependency. Applied in order, tracked by name.
const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_init",
    "
    CREATE TABLE barbers (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        rating REAL NOT NULL DEFAULT 0,
        rating_count INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE customers (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );

    CREATE TABLE categories (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );

    CREATE TABLE services (
        id INTEGER PRIMARY KEY,
        category_id INTEGER NOT NULL REFERENCES categories(id),
        name TEXT NOT NULL,
        base_price INTEGER NOT NULL,
        duration_minutes INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE working_schedules (
        id INTEGER PRIMARY KEY,
        barber_id INTEGER NOT NULL REFERENCES barbers(id),
        day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        is_available INTEGER NOT NULL DEFAULT 1,
        UNIQUE (barber_id, day_of_week)
    );

    CREATE TABLE time_off (
        id INTEGER PRIMARY KEY,
        barber_id INTEGER NOT NULL REFERENCES barbers(id),
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        reason TEXT
    );

    CREATE TABLE service_offerings (
        id INTEGER PRIMARY KEY,
        barber_id INTEGER NOT NULL REFERENCES barbers(id),
        service_id INTEGER NOT NULL REFERENCES services(id),
        custom_price INTEGER,
        custom_duration INTEGER,
        is_available INTEGER NOT NULL DEFAULT 1,
        UNIQUE (barber_id, service_id)
    );

    CREATE TABLE discounts (
        id INTEGER PRIMARY KEY,
        code TEXT UNIQUE,
        name TEXT NOT NULL,
        discount_type TEXT NOT NULL,
        value INTEGER NOT NULL,
        max_discount_amount INTEGER,
        min_order_amount INTEGER,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        usage_limit INTEGER,
        used_count INTEGER NOT NULL DEFAULT 0,
        customer_usage_limit INTEGER,
        applies_to TEXT NOT NULL DEFAULT 'all',
        is_active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE discount_applicability (
        id INTEGER PRIMARY KEY,
        discount_id INTEGER NOT NULL REFERENCES discounts(id),
        target_type TEXT NOT NULL,
        target_id INTEGER NOT NULL
    );

    CREATE TABLE customer_discounts (
        id INTEGER PRIMARY KEY,
        customer_id INTEGER NOT NULL REFERENCES customers(id),
        discount_id INTEGER NOT NULL REFERENCES discounts(id),
        used_count INTEGER NOT NULL DEFAULT 0,
        max_usage INTEGER,
        expires_at TEXT,
        UNIQUE (customer_id, discount_id)
    );

    CREATE TABLE bookings (
        id TEXT PRIMARY KEY,
        customer_id INTEGER NOT NULL REFERENCES customers(id),
        barber_id INTEGER NOT NULL REFERENCES barbers(id),
        service_id INTEGER NOT NULL REFERENCES services(id),
        booking_date TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        payment_status TEXT NOT NULL DEFAULT 'unpaid',
        original_price INTEGER NOT NULL,
        discount_id INTEGER REFERENCES discounts(id),
        discount_amount INTEGER NOT NULL DEFAULT 0,
        total_price INTEGER NOT NULL,
        notes TEXT,
        cancelled_at TEXT,
        cancel_reason TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX idx_bookings_barber_date ON bookings (barber_id, booking_date);

    CREATE TABLE discount_usages (
        id TEXT PRIMARY KEY,
        discount_id INTEGER NOT NULL REFERENCES discounts(id),
        customer_id INTEGER NOT NULL REFERENCES customers(id),
        booking_id TEXT NOT NULL UNIQUE REFERENCES bookings(id),
        original_amount INTEGER NOT NULL,
        discount_amount INTEGER NOT NULL,
        final_amount INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE reviews (
        id TEXT PRIMARY KEY,
        booking_id TEXT NOT NULL UNIQUE REFERENCES bookings(id),
        customer_id INTEGER NOT NULL REFERENCES customers(id),
        barber_id INTEGER NOT NULL REFERENCES barbers(id),
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        comment TEXT,
        created_at TEXT NOT NULL
    );
    ",
)];

pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("failed to check migration status")?;

        if already_applied {
            continue;
        }

        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;

        conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
            .with_context(|| format!("failed to record migration: {name}"))?;

        tracing::info!("applied migration: {name}");
    }

    Ok(())
}
