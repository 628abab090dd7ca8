mod restart_policy;
