mod concurrent_commits_case;
mod set_membership_case;
