/*! Integration tests for Formstack.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - path: FieldPath/FieldPathBuf normalization and navigation
 * - schema: schema loading and validation
 * - tree: the Field Value Tree (set/get, normalization, dirtiness, snapshots)
 * - rows: the row controller for array and blocks fields
 * - tabs: the tab partition controller
 * - drawer: the drawer stack (push/commit/cancel/discard, saves)
 * - relationship: inline create/edit and browse flows
 * - registry: controller dispatch and label resolution
 * - richtext: link annotations
 * - persistence: the in-memory backend
 * - scenarios: end-to-end editing sessions
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("formstack=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod drawer;
mod path;
mod persistence;
mod richtext;
mod scenarios;
mod schema;
mod tabs;
