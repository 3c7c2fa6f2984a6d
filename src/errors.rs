//! Start-up errors: loading settings, building the pool, migrating.
//!
//! Request-time failures are `types::ApiError`, not these.

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        R2D2(::r2d2::Error);
        ParseInt(::std::num::ParseIntError);
    }

    errors {
        Migration(reason: String) {
            description("failed to run database migrations")
            display("failed to run database migrations: {}", reason)
        }
    }
}
