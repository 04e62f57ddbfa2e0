// Copyright 2025 Sqlreplay Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Statement normalization.
//!
//! Two rewrites, applied in order:
//!
//! 1. `@Param` tokens fold to lower case, so textually different but
//!    equivalent parameterized statements replay identically on engines
//!    with different identifier-case rules;
//! 2. an unqualified `sp_set_session_context` call gains its `sys.`
//!    qualification, which some target engines require.

use regex::{Captures, Regex};

pub struct StatementNormalizer {
    param_re: Regex,
    session_context_re: Regex,
}

impl Default for StatementNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementNormalizer {
    pub fn new() -> Self {
        Self {
            param_re: Regex::new(r"@\w+").unwrap(),
            // Preceding '.' or word character means the call is already
            // qualified (or part of a longer identifier).
            session_context_re: Regex::new(r"(?i)(^|[^.\w])(sp_set_session_context)").unwrap(),
        }
    }

    pub fn normalize(&self, statement: &str) -> String {
        let folded = self
            .param_re
            .replace_all(statement, |caps: &Captures| caps[0].to_lowercase());
        self.session_context_re
            .replace_all(&folded, "${1}sys.${2}")
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_tokens_fold_to_lower_case() {
        let normalizer = StatementNormalizer::new();
        assert_eq!(
            normalizer.normalize("SELECT * WHERE x=@Param1"),
            "SELECT * WHERE x=@param1"
        );
        assert_eq!(
            normalizer.normalize("UPDATE t SET a=@FooBar, b=@BAZ WHERE c=@qux"),
            "UPDATE t SET a=@foobar, b=@baz WHERE c=@qux"
        );
    }

    #[test]
    fn keywords_outside_parameters_are_untouched() {
        let normalizer = StatementNormalizer::new();
        assert_eq!(
            normalizer.normalize("SELECT Name FROM T WHERE Id=@Id"),
            "SELECT Name FROM T WHERE Id=@id"
        );
    }

    #[test]
    fn session_context_call_gains_sys_qualification() {
        let normalizer = StatementNormalizer::new();
        assert_eq!(
            normalizer.normalize("EXEC sp_set_session_context 'a','b'"),
            "EXEC sys.sp_set_session_context 'a','b'"
        );
        assert_eq!(
            normalizer.normalize("exec SP_SET_SESSION_CONTEXT 'a',1"),
            "exec sys.SP_SET_SESSION_CONTEXT 'a',1"
        );
    }

    #[test]
    fn qualified_session_context_call_is_untouched() {
        let normalizer = StatementNormalizer::new();
        assert_eq!(
            normalizer.normalize("EXEC sys.sp_set_session_context 'a','b'"),
            "EXEC sys.sp_set_session_context 'a','b'"
        );
    }

    #[test]
    fn call_at_start_of_statement_is_qualified() {
        let normalizer = StatementNormalizer::new();
        assert_eq!(
            normalizer.normalize("sp_set_session_context 'k','v'"),
            "sys.sp_set_session_context 'k','v'"
        );
    }

    #[test]
    fn parameters_inside_session_context_call_fold_first() {
        let normalizer = StatementNormalizer::new();
        assert_eq!(
            normalizer.normalize("EXEC sp_set_session_context 'tenant',@TenantId"),
            "EXEC sys.sp_set_session_context 'tenant',@tenantid"
        );
    }
}
