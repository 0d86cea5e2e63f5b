/*!
 * Authenticated principal extractor
 *
 * Responsibility:
 * - middleware が extensions に入れた Principal を handler に渡す
 */

mod auth_principal;

pub use auth_principal::AuthPrincipal;
