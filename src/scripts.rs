//! Documentation about the various scripts contained herein
//!
//! Nagios checks (one line of output, exit 0/1/2/3):
//!
//! - [check-activemq-queue](#check-activemq-queue)
//! - [check-activemq](#check-activemq)
//! - [check-cert](#check-cert)
//! - [check-dir](#check-dir)
//! - [check-lighttpd-load](#check-lighttpd-load)
//! - [check-puppet](#check-puppet)
//! - [check-puppetdb-nodes](#check-puppetdb-nodes)
//!
//! Cacti/SNMP query scripts (output for the grapher, not for Nagios):
//!
//! - [query-activemq-stats](#query-activemq-stats)
//! - [query-lighttpd-stats](#query-lighttpd-stats)
//! - [query-tomcat-stats](#query-tomcat-stats)
//! - [diskstats-parse](#diskstats-parse)
//!
//! # check-activemq-queue
//!
//! Asks the ActiveMQ Statistics Plugin for one queue's stats over STOMP and
//! alerts on queue depth and broker memory use:
//!
//! ```plain
//! check-activemq-queue --host amq1.example.net --queue foo.bar \
//!     --queue-warn 100 --queue-crit 500
//! ```
//!
//! Needs the statistics plugin enabled on the broker. `--host` can be given
//! several times for active/passive pairs.
//!
//! # check-activemq
//!
//! Round-trip latency probe: publishes a random token to a destination it
//! is subscribed to and times the echo. Timeouts and mangled bodies are
//! CRITICAL, a slow echo is WARNING or CRITICAL per the thresholds:
//!
//! ```plain
//! check-activemq --host amq1.example.net --warning 2 --critical 5
//! ```
//!
//! When several nagios instances watch the same broker, give each its own
//! `--destination` topic so they don't consume each other's probes.
//!
//! # check-cert
//!
//! Alerts when a certificate or CRL is close to expiry, scraping dates out
//! of the `openssl` tool:
//!
//! ```plain
//! check-cert --cert /etc/pki/tls/certs/www.pem --warn 1209600 --crit 86400
//! ```
//!
//! # check-dir
//!
//! Counts entries in a directory, optionally only those whose name matches
//! a regex. Useful for queue-as-spool-directory setups:
//!
//! ```plain
//! check-dir --directory /var/spool/outgoing --warn 50 --crit 200
//! ```
//!
//! # check-lighttpd-load
//!
//! Reads lighttpd's `?auto` status page and alerts on BusyServers.
//!
//! # check-puppet
//!
//! Checks the local Puppet agent from its state files: how long since the
//! last run, how many resources failed, whether the agent is disabled. A
//! run summary without an `events` section means the run never got that
//! far, which is reported as a total failure.
//!
//! # check-puppetdb-nodes
//!
//! Queries PuppetDB's `/v3/nodes`. With `--age`, alerts when the oldest
//! catalog is stale; with `--nodes`, alerts on population size, where
//! `crit < warn` flips the comparison into a population floor.
//!
//! # query-activemq-stats
//!
//! Cacti input: dumps every statistic the broker returns for `--report
//! broker` or `--report <queue>` as `key:value` pairs on one line.
//!
//! # query-lighttpd-stats
//!
//! Cacti input for lighttpd's fastcgi counters, aggregated per backend:
//! `index` lists backends, `query <field>` prints one field for every
//! backend, `get <field> <backend>` prints a single value.
//!
//! # query-tomcat-stats
//!
//! Cacti input: JVM memory and connector thread counts from the Tomcat
//! manager status page.
//!
//! # diskstats-parse
//!
//! SNMP exec helper: prints the raw `/proc/diskstats` fields for one
//! device, one per line.
